//! Configuration for a scheduled eviction pool.

use std::time::Duration;

/// Default idle time before an entry is evicted (one hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3_600);

/// Configuration for a [`SchedPool`](crate::SchedPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Idle duration after which an entry is evicted.
    /// Individual scheduling calls may override it.
    pub default_ttl: Duration,

    /// Whether `get`/`set`/`with_mut` arm the deletion timer themselves.
    /// With `false` the pool is manually managed: entries carry the
    /// "no timer" marker until `schedule_deletion` is called.
    pub auto_schedule: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            auto_schedule: true,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enable or disable automatic deletion scheduling.
    pub fn with_auto_schedule(mut self, enabled: bool) -> Self {
        self.auto_schedule = enabled;
        self
    }
}
