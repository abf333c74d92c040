//! Engine options
//!
//! Options are plain data with serde defaults, so a partial TOML document
//! only overrides what it names:
//!
//! ```toml
//! owner_thread_name = "server-main"
//! log_arguments = false
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

/// Default name of the owning thread
pub const DEFAULT_OWNER_THREAD_NAME: &str = "hostbind-owner";

/// Default message for failures without a usable cause message
pub const DEFAULT_FALLBACK_ERROR_MESSAGE: &str = "unknown error";

/// Runtime options for a `HostBridge`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOptions {
    /// Name given to the owning thread
    pub owner_thread_name: String,
    /// Include argument snapshots in failure logs
    pub log_arguments: bool,
    /// Run synchronous calls inline when already on the owning thread
    pub run_inline_on_owner: bool,
    /// Message used when no cause in the chain has one
    pub fallback_error_message: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            owner_thread_name: DEFAULT_OWNER_THREAD_NAME.to_string(),
            log_arguments: true,
            run_inline_on_owner: true,
            fallback_error_message: DEFAULT_FALLBACK_ERROR_MESSAGE.to_string(),
        }
    }
}

impl EngineOptions {
    /// Parse options from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let options: EngineOptions = toml::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    /// Check values serde cannot check
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner_thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "owner_thread_name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.owner_thread_name.contains('\0') {
            return Err(ConfigError::Invalid {
                key: "owner_thread_name",
                reason: "must not contain NUL".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.owner_thread_name, "hostbind-owner");
        assert!(options.log_arguments);
        assert!(options.run_inline_on_owner);
        assert_eq!(options.fallback_error_message, "unknown error");
    }

    #[test]
    fn test_partial_toml() {
        let options = EngineOptions::from_toml_str("log_arguments = false\n").unwrap();
        assert!(!options.log_arguments);
        assert_eq!(options.owner_thread_name, "hostbind-owner");
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            EngineOptions::from_toml_str("log_arguments = "),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineOptions::from_toml_str("no_such_option = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_thread_name_rejected() {
        assert!(matches!(
            EngineOptions::from_toml_str("owner_thread_name = \"  \""),
            Err(ConfigError::Invalid { key: "owner_thread_name", .. })
        ));
    }
}
