use std::time::Duration;

/// How long incoming snapshots stay suppressed behind a pending operation
pub const DEFAULT_SUPPRESSION: Duration = Duration::from_secs(2);

/// Coalescing window for high-churn property writes
pub const DEFAULT_PROPERTY_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub suppression: Duration,
    pub property_debounce: Duration,
    /// Ask the authority to echo our own writes to every subscriber
    pub broadcast_own_writes: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            suppression: DEFAULT_SUPPRESSION,
            property_debounce: DEFAULT_PROPERTY_DEBOUNCE,
            broadcast_own_writes: false,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suppression(mut self, suppression: Duration) -> Self {
        self.suppression = suppression;
        self
    }

    pub fn with_property_debounce(mut self, debounce: Duration) -> Self {
        self.property_debounce = debounce;
        self
    }

    pub fn with_broadcast_own_writes(mut self, broadcast: bool) -> Self {
        self.broadcast_own_writes = broadcast;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.suppression, Duration::from_secs(2));
        assert_eq!(config.property_debounce, Duration::from_millis(100));
        assert!(!config.broadcast_own_writes);
    }
}
