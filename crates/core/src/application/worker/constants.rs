// Harness defaults (no magic values in the loops; every one is overridable)
use std::time::Duration;

/// Wait after a claim finds no pending entry (1s)
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_secs(1);

/// Lower bound of the simulated processing latency (1ms)
pub const DEFAULT_MIN_PROCESSING_LATENCY: Duration = Duration::from_millis(1);

/// Upper bound of the simulated processing latency (10ms)
pub const DEFAULT_MAX_PROCESSING_LATENCY: Duration = Duration::from_millis(10);

/// Capacity of the bounded result stream shared by all workers
pub const DEFAULT_RESULT_BUFFER: usize = 10;

/// Sample pool diagnostics every Nth aggregated result
pub const DEFAULT_POOL_SAMPLE_EVERY: u64 = 10;

/// Correlation ids drawn by the producers
pub const DEFAULT_CORRELATION_IDS: [i64; 2] = [1, 2];

/// Token bucket capacity of the rate-limited producer
pub const RATE_LIMITER_CAPACITY: u32 = 1;
