//! Configuration schema types
//!
//! This module defines the configuration structure for Masquerade.

use crate::anonymization::config::EngineConfig;
use crate::anonymization::models::PolicyDraft;
use crate::anonymization::vault::KEY_LEN;
use crate::config::SecretString;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Main Masquerade configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasqueradeConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Engine settings (cache, vault, fallback, audit)
    #[serde(default)]
    pub engine: EngineConfig,

    /// Named encryption keys
    #[serde(default)]
    pub keys: Vec<KeyConfig>,

    /// Policies registered at start-up
    #[serde(default)]
    pub policies: Vec<PolicyDraft>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MasqueradeConfig {
    /// Validate the entire configuration
    ///
    /// Policies are only checked for shape here; full validation happens
    /// when they are registered with an engine.
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.engine.validate().map_err(|e| format!("{e:#}"))?;
        self.logging.validate()?;

        let mut key_ids = HashSet::new();
        for key in &self.keys {
            key.validate()?;
            if !key_ids.insert(key.id.as_str()) {
                return Err(format!("Duplicate key id '{}'", key.id));
            }
        }

        let mut policy_ids = HashSet::new();
        for policy in &self.policies {
            if policy.name.trim().is_empty() {
                return Err("Policy name cannot be empty".to_string());
            }
            if let Some(id) = &policy.id {
                if !policy_ids.insert(id.as_str()) {
                    return Err(format!("Duplicate policy id '{id}'"));
                }
            }
        }

        Ok(())
    }
}

impl Default for MasqueradeConfig {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            engine: EngineConfig::default(),
            keys: Vec::new(),
            policies: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Encryption key entry
///
/// `material` is hex-encoded and never printed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Logical key id referenced by rules
    pub id: String,

    /// Hex-encoded 32-byte key, usually `${VAR}`-substituted
    pub material: SecretString,
}

impl KeyConfig {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("keys.id cannot be empty".to_string());
        }

        let material = self.material.expose_secret().as_ref().trim();
        if material.len() != KEY_LEN * 2 || !material.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!(
                "Key '{}' must be {} hex characters ({} bytes)",
                self.id,
                KEY_LEN * 2,
                KEY_LEN
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    /// Console-only logging
    pub fn console() -> Self {
        Self {
            local_enabled: false,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn key(id: &str, material: &str) -> KeyConfig {
        KeyConfig {
            id: id.to_string(),
            material: secret_string(material.to_string()),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(MasqueradeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = MasqueradeConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().unwrap_err().contains("log_level"));
    }

    #[test]
    fn test_key_validation() {
        let mut config = MasqueradeConfig::default();
        config.keys.push(key("default", &"ab".repeat(KEY_LEN)));
        assert!(config.validate().is_ok());

        config.keys.push(key("default", &"cd".repeat(KEY_LEN)));
        assert!(config.validate().unwrap_err().contains("Duplicate key id"));

        config.keys = vec![key("short", "abcd")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_key_material_redacted_in_debug() {
        let config = key("default", &"ab".repeat(KEY_LEN));
        assert!(!format!("{config:?}").contains("abab"));
    }

    #[test]
    fn test_invalid_rotation() {
        let mut config = MasqueradeConfig::default();
        config.logging.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}
