//! Engine configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the evaluation cache is invalidated on policy mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheInvalidation {
    /// Clear the whole cache
    #[default]
    Full,
    /// Drop only entries whose requester falls in the mutated policy's scope
    Scope,
}

/// What `anonymize` does when no policy or rule resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackBehavior {
    /// Propagate the resolution error
    #[default]
    Deny,
    /// Fully mask the value
    FullMask,
}

/// Anonymization engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Evaluation cache entry lifetime
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Maximum number of cached evaluations
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default)]
    pub cache_invalidation: CacheInvalidation,

    /// Maximum entries per token vault direction
    #[serde(default = "default_vault_capacity")]
    pub vault_capacity: usize,

    /// Bound on every key retrieval
    #[serde(default = "default_key_timeout_ms")]
    pub key_timeout_ms: u64,

    #[serde(default)]
    pub fallback: FallbackBehavior,

    /// Audit logging configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_vault_capacity() -> usize {
    100_000
}

fn default_key_timeout_ms() -> u64 {
    2000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_capacity: default_cache_capacity(),
            cache_invalidation: CacheInvalidation::default(),
            vault_capacity: default_vault_capacity(),
            key_timeout_ms: default_key_timeout_ms(),
            fallback: FallbackBehavior::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn key_timeout(&self) -> Duration {
        Duration::from_millis(self.key_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            anyhow::bail!("engine.cache_capacity must be > 0");
        }
        if self.vault_capacity == 0 {
            anyhow::bail!("engine.vault_capacity must be > 0");
        }
        if self.key_timeout_ms == 0 {
            anyhow::bail!("engine.key_timeout_ms must be > 0");
        }

        self.audit.validate().context("Invalid audit configuration")?;

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("MASQUERADE_ENGINE_CACHE_TTL_SECONDS") {
            self.cache_ttl_seconds = val
                .parse()
                .context("Invalid MASQUERADE_ENGINE_CACHE_TTL_SECONDS value")?;
        }

        if let Ok(val) = std::env::var("MASQUERADE_ENGINE_CACHE_CAPACITY") {
            self.cache_capacity = val
                .parse()
                .context("Invalid MASQUERADE_ENGINE_CACHE_CAPACITY value")?;
        }

        if let Ok(val) = std::env::var("MASQUERADE_ENGINE_CACHE_INVALIDATION") {
            self.cache_invalidation = match val.to_lowercase().as_str() {
                "full" => CacheInvalidation::Full,
                "scope" => CacheInvalidation::Scope,
                _ => anyhow::bail!("Invalid MASQUERADE_ENGINE_CACHE_INVALIDATION: {}", val),
            };
        }

        if let Ok(val) = std::env::var("MASQUERADE_ENGINE_VAULT_CAPACITY") {
            self.vault_capacity = val
                .parse()
                .context("Invalid MASQUERADE_ENGINE_VAULT_CAPACITY value")?;
        }

        if let Ok(val) = std::env::var("MASQUERADE_ENGINE_KEY_TIMEOUT_MS") {
            self.key_timeout_ms = val
                .parse()
                .context("Invalid MASQUERADE_ENGINE_KEY_TIMEOUT_MS value")?;
        }

        if let Ok(val) = std::env::var("MASQUERADE_ENGINE_FALLBACK") {
            self.fallback = match val.to_lowercase().as_str() {
                "deny" => FallbackBehavior::Deny,
                "full_mask" => FallbackBehavior::FullMask,
                _ => anyhow::bail!("Invalid MASQUERADE_ENGINE_FALLBACK: {}", val),
            };
        }

        self.audit.apply_env_overrides()?;

        Ok(())
    }
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default)]
    pub enabled: bool,

    /// Audit log file path
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,

    /// Use JSON format for audit logs
    #[serde(default = "default_audit_json_format")]
    pub json_format: bool,

    /// Bound on a single audit write
    #[serde(default = "default_audit_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("./audit/masquerade.log")
}

fn default_audit_json_format() -> bool {
    true
}

fn default_audit_timeout_ms() -> u64 {
    500
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: default_audit_log_path(),
            json_format: default_audit_json_format(),
            timeout_ms: default_audit_timeout_ms(),
        }
    }
}

impl AuditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate audit configuration
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.log_path.as_os_str().is_empty() {
            anyhow::bail!("audit.log_path must not be empty when audit is enabled");
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("audit.timeout_ms must be > 0");
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("MASQUERADE_ENGINE_AUDIT_ENABLED") {
            self.enabled = val
                .parse()
                .context("Invalid MASQUERADE_ENGINE_AUDIT_ENABLED value")?;
        }

        if let Ok(val) = std::env::var("MASQUERADE_ENGINE_AUDIT_LOG_PATH") {
            self.log_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("MASQUERADE_ENGINE_AUDIT_JSON_FORMAT") {
            self.json_format = val
                .parse()
                .context("Invalid MASQUERADE_ENGINE_AUDIT_JSON_FORMAT value")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.cache_invalidation, CacheInvalidation::Full);
        assert_eq!(config.fallback, FallbackBehavior::Deny);
        assert!(!config.audit.enabled);
        assert!(config.audit.json_format);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = EngineConfig {
            cache_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
cache_ttl_seconds = 60
fallback = "full_mask"

[audit]
enabled = true
"#,
        )
        .unwrap();
        assert_eq!(config.cache_ttl_seconds, 60);
        assert_eq!(config.fallback, FallbackBehavior::FullMask);
        assert!(config.audit.enabled);
        assert_eq!(config.vault_capacity, 100_000);
    }
}
