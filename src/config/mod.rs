//! Configuration management for Masquerade.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Masquerade uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MASQUERADE_*` environment overrides
//! - Default values for optional settings
//! - Policies declared alongside engine settings
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`EngineConfig`](crate::anonymization::EngineConfig) - Cache, vault, fallback and audit
//! - [`KeyConfig`] - Named encryption keys
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [engine]
//! cache_ttl_seconds = 300
//! fallback = "deny"
//!
//! [[keys]]
//! id = "default"
//! material = "${MASQUERADE_DEFAULT_KEY}"
//!
//! [[policies]]
//! name = "Phone numbers"
//!
//! [[policies.rules]]
//! name = "mask phones"
//! field = "phone"
//! technique = "masking"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{ApplicationConfig, KeyConfig, LoggingConfig, MasqueradeConfig};
pub use secret::{secret_string, SecretString, SecretValue};
