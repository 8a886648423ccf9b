//! Token bucket for the rate-limited producer.
//!
//! Lock-free: the whole bucket state is one atomic "theoretical arrival
//! time" (GCRA form of a token bucket), updated with a CAS loop.
//! Time comes from `tokio::time::Instant` so paused-clock tests work.

use crate::error::{AppError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Token bucket with a fixed capacity and refill rate
pub struct TokenBucket {
    // Nanoseconds since `origin` at which the bucket is next full-minus-one
    tat_nanos: AtomicU64,
    origin: Instant,
    interval_nanos: u64,
    burst_nanos: u64,
    rate_per_sec: f64,
}

impl TokenBucket {
    /// Create a bucket refilling `rate_per_sec` tokens per second
    ///
    /// # Arguments
    /// * `rate_per_sec` - Refill rate, must be finite and positive
    /// * `capacity` - Maximum burst size, at least 1
    ///
    /// # Example
    /// One insert every 100ms with no burst:
    /// `TokenBucket::new(10.0, 1)`
    pub fn new(rate_per_sec: f64, capacity: u32) -> Result<Self> {
        if !rate_per_sec.is_finite() || rate_per_sec <= 0.0 {
            return Err(AppError::Config(format!(
                "token bucket rate must be a positive number, got {}",
                rate_per_sec
            )));
        }
        if capacity == 0 {
            return Err(AppError::Config(
                "token bucket capacity must be at least 1".to_string(),
            ));
        }

        let interval_nanos = ((1e9 / rate_per_sec) as u64).max(1);
        Ok(Self {
            tat_nanos: AtomicU64::new(0),
            origin: Instant::now(),
            interval_nanos,
            burst_nanos: interval_nanos.saturating_mul(u64::from(capacity - 1)),
            rate_per_sec,
        })
    }

    pub fn rate_per_sec(&self) -> f64 {
        self.rate_per_sec
    }

    /// Take one token, returning how long the caller must wait for it
    ///
    /// The token is reserved immediately; waits queue up behind each other.
    pub fn reserve(&self) -> Duration {
        loop {
            let now = self.origin.elapsed().as_nanos() as u64;
            let tat = self.tat_nanos.load(Ordering::Acquire);

            let ready_at = now.max(tat.saturating_sub(self.burst_nanos));
            let new_tat = now.max(tat) + self.interval_nanos;

            match self.tat_nanos.compare_exchange(
                tat,
                new_tat,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return Duration::from_nanos(ready_at - now),
                Err(_) => continue, // Retry
            }
        }
    }

    /// Wait until a token is available and take it
    pub async fn acquire(&self) {
        let wait = self.reserve();
        if !wait.is_zero() {
            trace!(wait_ms = wait.as_millis() as u64, "Waiting for token");
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_rejects_invalid_rate() {
        assert!(TokenBucket::new(0.0, 1).is_err());
        assert!(TokenBucket::new(-1.0, 1).is_err());
        assert!(TokenBucket::new(f64::NAN, 1).is_err());
        assert!(TokenBucket::new(5.0, 0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_one_spaces_tokens() {
        let bucket = TokenBucket::new(10.0, 1).unwrap();

        assert_eq!(bucket.reserve(), Duration::ZERO);
        assert_eq!(bucket.reserve(), Duration::from_millis(100));
        assert_eq!(bucket.reserve(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_up_to_capacity() {
        let bucket = TokenBucket::new(10.0, 3).unwrap();

        for _ in 0..3 {
            assert_eq!(bucket.reserve(), Duration::ZERO);
        }
        assert_eq!(bucket.reserve(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_does_not_accumulate_beyond_capacity() {
        let bucket = TokenBucket::new(10.0, 1).unwrap();
        bucket.acquire().await;

        sleep(Duration::from_secs(5)).await;

        assert_eq!(bucket.reserve(), Duration::ZERO);
        assert_eq!(bucket.reserve(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_rate_over_window() {
        let bucket = TokenBucket::new(20.0, 1).unwrap();
        let start = Instant::now();

        let mut taken = 0;
        while start.elapsed() < Duration::from_secs(5) {
            bucket.acquire().await;
            taken += 1;
        }

        // 20/s over 5s, plus the immediate first token
        assert!((100..=101).contains(&taken), "took {} tokens", taken);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reservations_are_distinct() {
        let bucket = Arc::new(TokenBucket::new(50.0, 1).unwrap());

        let mut handles = vec![];
        for _ in 0..10 {
            let bucket = Arc::clone(&bucket);
            handles.push(tokio::spawn(async move {
                (0..20).map(|_| bucket.reserve()).collect::<Vec<_>>()
            }));
        }

        let mut waits = Vec::new();
        for handle in handles {
            waits.extend(handle.await.unwrap());
        }
        waits.sort();
        waits.dedup();
        assert_eq!(waits.len(), 200, "every reservation gets its own slot");
        assert_eq!(waits[199], Duration::from_millis(20 * 199));
    }
}
