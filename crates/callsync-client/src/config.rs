//! Session configuration.

use callsync_proto::ConversionOptions;

/// Default command namespace.
pub const DEFAULT_COMMAND_NAMESPACE: &str = "call";

/// Default capacity of the roster notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Session tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Prefix of outbound command methods (`call` → `call.mute`).
    pub command_namespace: String,
    /// List-valued keys converted element-wise in addition to the built-in ones.
    pub extra_convertible_keys: Vec<String>,
    /// Buffered roster snapshots per subscriber before the slowest lags.
    pub notification_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_namespace: DEFAULT_COMMAND_NAMESPACE.to_string(),
            extra_convertible_keys: Vec::new(),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Naming options for payload snapshots.
    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions::default()
            .with_convertible_keys(self.extra_convertible_keys.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_namespace_is_call() {
        let config = SessionConfig::default();
        assert_eq!(config.command_namespace, "call");
        assert_eq!(config.notification_capacity, DEFAULT_NOTIFICATION_CAPACITY);
    }

    #[test]
    fn extra_keys_extend_defaults() {
        let config = SessionConfig {
            extra_convertible_keys: vec!["participants".to_string()],
            ..SessionConfig::default()
        };
        let options = config.conversion_options();
        assert!(options.convertible_keys.iter().any(|k| k == "participants"));
        assert!(options.convertible_keys.iter().any(|k| k == "members"));
    }
}
