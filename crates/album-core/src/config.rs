//! Tunables for the album pipeline.

use std::time::Duration;

/// Default quiet period before an upload burst is finalized.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);
/// Default pause between posts of one collection.
pub const DEFAULT_INTER_POST_DELAY: Duration = Duration::from_secs(1);
/// Lowest deletion delay an admin may configure.
pub const DEFAULT_MIN_DELETE_AFTER: Duration = Duration::from_secs(5);
/// Deletion delay written on first boot.
pub const DEFAULT_DELETE_AFTER: Duration = Duration::from_secs(300);
pub const DEFAULT_SETTINGS_CACHE_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration shared by the core components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// The single chat albums are published into. Allow-lists are scoped to it.
    pub destination: i64,
    pub debounce: Duration,
    pub inter_post_delay: Duration,
    pub min_delete_after: Duration,
    pub default_delete_after: Duration,
    pub settings_cache_ttl: Duration,
    pub sweep_interval: Duration,
}

impl CoreConfig {
    /// Create a configuration with default timings.
    pub fn new(destination: i64) -> Self {
        Self {
            destination,
            debounce: DEFAULT_DEBOUNCE,
            inter_post_delay: DEFAULT_INTER_POST_DELAY,
            min_delete_after: DEFAULT_MIN_DELETE_AFTER,
            default_delete_after: DEFAULT_DELETE_AFTER,
            settings_cache_ttl: DEFAULT_SETTINGS_CACHE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_inter_post_delay(mut self, delay: Duration) -> Self {
        self.inter_post_delay = delay;
        self
    }

    /// Set the deletion floor. The first-boot delay is raised to match if needed.
    pub fn with_min_delete_after(mut self, floor: Duration) -> Self {
        self.min_delete_after = floor;
        self.default_delete_after = self.default_delete_after.max(floor);
        self
    }

    pub fn with_default_delete_after(mut self, delay: Duration) -> Self {
        self.default_delete_after = delay.max(self.min_delete_after);
        self
    }

    pub fn with_settings_cache_ttl(mut self, ttl: Duration) -> Self {
        self.settings_cache_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
