// Masquerade - Policy-driven anonymization engine
// Copyright (c) 2025 Masquerade Contributors
// Licensed under the MIT License

//! # Masquerade - policy-driven anonymization
//!
//! Masquerade decides, per field and per caller, how a sensitive value is
//! anonymized, and then does it. Phone numbers are the worked data type.
//!
//! ## Overview
//!
//! This library provides:
//! - **Policies** scoped to global, organization, team or user, with
//!   conditional rules and deterministic resolution
//! - **Techniques**: masking, consistent tokenization, reversible
//!   AES-256-GCM encryption, generalization and suppression
//! - **Reversal** of tokens and ciphertext through an explicit vault and
//!   key provider
//! - **Audit** events for every evaluation and anonymization
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`anonymization`] - Engine, policies, techniques, vault and audit
//! - [`domain`] - Error types and the result alias
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use masquerade::anonymization::AnonymizationEngine;
//! use masquerade::anonymization::models::EvaluationContext;
//! use masquerade::config::load_config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("masquerade.toml")?;
//!     let engine = AnonymizationEngine::from_config(&config)?;
//!
//!     let ctx = EvaluationContext::builder("user-1", "analyst", "phone")
//!         .pii_type("phone")
//!         .build();
//!     let result = engine.anonymize("+1-415-555-0100", &ctx, None).await?;
//!
//!     println!("{} (quality {:.2})", result.anonymized, result.quality_score);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Engine operations return [`domain::Result`] over [`domain::MasqueradeError`].
//! Resolution failures (`PolicyNotFound`, `RuleNotMatched`) are distinct from
//! technique failures so callers can choose their own fallback.
//!
//! ## Logging
//!
//! Masquerade logs with `tracing`. Values are never logged in clear; audit
//! events carry SHA-256 hashes instead.

pub mod anonymization;
pub mod cli;
pub mod config;
pub mod domain;
pub mod logging;
