// Time Provider Port (for testability)

use chrono::{DateTime, Utc};

/// Time provider interface (allows fixed clocks in tests)
pub trait TimeProvider: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
