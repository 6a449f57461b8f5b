//! Domain error types
//!
//! This module defines the error hierarchy for Masquerade. Errors raised by
//! policy management and evaluation are distinct variants so callers can pick
//! an explicit fallback instead of treating them as transient failures.

use thiserror::Error;

/// Main Masquerade error type
///
/// This is the primary error type used throughout the library.
#[derive(Debug, Error)]
pub enum MasqueradeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A policy failed validation on create or update
    #[error("Policy validation error: {0}")]
    PolicyValidation(String),

    /// No policy applies to the evaluation context (or the id is unknown)
    #[error("No applicable policy: {0}")]
    PolicyNotFound(String),

    /// Applicable policies exist but no rule scored above zero
    #[error("No rule matched: {0}")]
    RuleNotMatched(String),

    /// Technique-level failures (always propagated)
    #[error("Anonymization technique error: {0}")]
    Technique(#[from] TechniqueError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl MasqueradeError {
    /// Whether this error comes from policy resolution rather than execution
    pub fn is_resolution_error(&self) -> bool {
        matches!(self, Self::PolicyNotFound(_) | Self::RuleNotMatched(_))
    }
}

/// Errors raised by an anonymization technique
#[derive(Debug, Error)]
pub enum TechniqueError {
    /// The input value was empty or whitespace
    #[error("Value is empty")]
    EmptyValue,

    /// The key provider could not supply key material
    #[error("Key provider failure: {0}")]
    KeyProvider(#[from] KeyProviderError),

    /// The AEAD cipher rejected the operation
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The technique is declared but has no implementation
    #[error("Unsupported technique: {0}")]
    UnsupportedTechnique(String),

    /// A unique token could not be minted
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    /// The rule configuration is not usable for this technique
    #[error("Invalid technique configuration: {0}")]
    InvalidConfig(String),
}

/// Key provider errors
///
/// These errors don't expose the backing key-management types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyProviderError {
    /// No key registered under the id
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Key material has the wrong size or encoding
    #[error("Invalid key material for '{0}'")]
    InvalidKey(String),

    /// The provider did not answer in time
    #[error("Key retrieval for '{key_id}' timed out after {timeout_ms}ms")]
    Timeout { key_id: String, timeout_ms: u64 },

    /// The provider is unreachable or failed internally
    #[error("Key provider unavailable: {0}")]
    Unavailable(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for MasqueradeError {
    fn from(err: std::io::Error) -> Self {
        MasqueradeError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for MasqueradeError {
    fn from(err: serde_json::Error) -> Self {
        MasqueradeError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for MasqueradeError {
    fn from(err: toml::de::Error) -> Self {
        MasqueradeError::Configuration(format!("TOML parse error: {err}"))
    }
}
