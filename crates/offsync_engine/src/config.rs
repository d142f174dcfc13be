//! Configuration for the sync engine.

use offsync_protocol::{ConflictPolicy, SnapshotConfig};
use std::time::Duration;

/// Configuration for an engine instance. Immutable after construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Storage budget in bytes; exceeding it triggers eviction.
    pub max_storage_budget_bytes: u64,
    /// Cadence of the periodic sync trigger.
    pub sync_interval: Duration,
    /// Maximum transmission attempts per queue entry before it is
    /// dropped.
    pub max_retries: u32,
    /// Whether the periodic sync trigger is enabled.
    pub auto_sync_enabled: bool,
    /// Conflict resolution policy.
    pub conflict_policy: ConflictPolicy,
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage budget in bytes.
    #[must_use]
    pub fn with_storage_budget(mut self, bytes: u64) -> Self {
        self.max_storage_budget_bytes = bytes;
        self
    }

    /// Sets the sync cadence.
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the maximum transmission attempts per queue entry.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Enables or disables the periodic sync trigger.
    #[must_use]
    pub fn with_auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync_enabled = enabled;
        self
    }

    /// Sets the conflict resolution policy.
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_storage_budget_bytes: 50 * 1024 * 1024, // 50 MB
            sync_interval: Duration::from_secs(30),
            max_retries: 3,
            auto_sync_enabled: true,
            conflict_policy: ConflictPolicy::ServerWins,
        }
    }
}

impl From<&EngineConfig> for SnapshotConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_storage_budget_bytes: config.max_storage_budget_bytes,
            sync_interval_ms: config.sync_interval.as_millis() as u64,
            max_retries: config.max_retries,
            auto_sync_enabled: config.auto_sync_enabled,
            conflict_policy: config.conflict_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_storage_budget_bytes, 50 * 1024 * 1024);
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert!(config.auto_sync_enabled);
        assert_eq!(config.conflict_policy, ConflictPolicy::ServerWins);
    }

    #[test]
    fn builder_pattern() {
        let config = EngineConfig::new()
            .with_storage_budget(1024)
            .with_sync_interval(Duration::from_secs(5))
            .with_max_retries(7)
            .with_auto_sync(false)
            .with_conflict_policy(ConflictPolicy::Merge);

        assert_eq!(config.max_storage_budget_bytes, 1024);
        assert_eq!(config.sync_interval, Duration::from_secs(5));
        assert_eq!(config.max_retries, 7);
        assert!(!config.auto_sync_enabled);
        assert_eq!(config.conflict_policy, ConflictPolicy::Merge);
    }

    #[test]
    fn snapshot_config_mirror() {
        let config = EngineConfig::new().with_sync_interval(Duration::from_millis(1500));
        let snapshot = SnapshotConfig::from(&config);
        assert_eq!(snapshot.sync_interval_ms, 1500);
        assert_eq!(snapshot.conflict_policy, config.conflict_policy);
    }
}
