//! Anonymization module for Masquerade
//!
//! This module decides, per field and per caller, which anonymization
//! technique applies and executes it on phone-like values.
//!
//! # Architecture
//!
//! The anonymization pipeline consists of:
//! - **Policy**: versioned scoped policies, rule scoring and an evaluation cache
//! - **Format**: best-effort phone number parsing and layout detection
//! - **Anonymizer**: masking, tokenization, encryption, generalization and suppression
//! - **Vault**: token bookkeeping and key material for reversal
//! - **Audit**: pluggable sink with hashed value references
//!
//! # Usage
//!
//! ```rust,ignore
//! use masquerade::anonymization::{AnonymizationEngine, EngineConfig};
//!
//! let engine = AnonymizationEngine::new(EngineConfig::default(), key_provider)?;
//! let result = engine.anonymize("+1-415-555-0100", &ctx, None).await?;
//! ```

pub mod anonymizer;
pub mod audit;
pub mod config;
pub mod engine;
pub mod format;
pub mod models;
pub mod policy;
pub mod quality;
pub mod vault;

// Re-export main types
pub use config::{AuditConfig, CacheInvalidation, EngineConfig, FallbackBehavior};
pub use engine::{AnonymizationEngine, EngineStatistics};
pub use models::{
    AnonymizationPolicy, AnonymizationResult, AnonymizationRule, AnonymizationTechnique,
    EvaluationContext, PolicyDraft, PolicyEvaluationResult, PolicyScope,
};
