//! CLI command implementations
//!
//! This module contains all CLI command implementations and the request
//! context flags shared by `anonymize` and `evaluate`.

pub mod anonymize;
pub mod evaluate;
pub mod init;
pub mod validate;

use crate::anonymization::models::EvaluationContext;
use crate::anonymization::AnonymizationEngine;
use crate::config::load_config;
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::Value;

/// Who is asking, and for which field
#[derive(Args, Debug, Clone)]
pub struct ContextArgs {
    /// Requesting user id
    #[arg(long, default_value = "cli")]
    pub user: String,

    /// Requesting role
    #[arg(long, default_value = "operator")]
    pub role: String,

    /// Field being accessed
    #[arg(long)]
    pub field: String,

    /// Organization id of the requester
    #[arg(long)]
    pub organization: Option<String>,

    /// Team id of the requester
    #[arg(long)]
    pub team: Option<String>,

    /// Data classification of the field
    #[arg(long)]
    pub classification: Option<String>,

    /// Data type of the field
    #[arg(long, default_value = "string")]
    pub data_type: String,

    /// PII types carried by the field (repeatable)
    #[arg(long = "pii-type")]
    pub pii_types: Vec<String>,

    /// Requester location
    #[arg(long)]
    pub location: Option<String>,

    /// Purpose of the request
    #[arg(long)]
    pub purpose: Option<String>,

    /// Evaluation time (RFC 3339); defaults to now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Extra context as key=value (repeatable); JSON values are parsed
    #[arg(long = "meta", value_parser = parse_key_value)]
    pub metadata: Vec<(String, Value)>,
}

impl ContextArgs {
    pub fn to_context(&self) -> EvaluationContext {
        let mut builder = EvaluationContext::builder(&self.user, &self.role, &self.field)
            .data_type(&self.data_type);

        if let Some(organization) = &self.organization {
            builder = builder.organization(organization);
        }
        if let Some(team) = &self.team {
            builder = builder.team(team);
        }
        if let Some(classification) = &self.classification {
            builder = builder.classification(classification);
        }
        if let Some(location) = &self.location {
            builder = builder.location(location);
        }
        if let Some(purpose) = &self.purpose {
            builder = builder.purpose(purpose);
        }
        if let Some(at) = self.at {
            builder = builder.timestamp(at);
        }
        for pii_type in &self.pii_types {
            builder = builder.pii_type(pii_type);
        }
        for (key, value) in &self.metadata {
            builder = builder.metadata(key, value.clone());
        }

        builder.build()
    }
}

fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

/// Load the configuration and build an engine, reporting failures to the user
///
/// Returns `None` after printing the error; callers exit with code 2.
pub(crate) fn build_engine(config_path: &str) -> Option<AnonymizationEngine> {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {e}");
            return None;
        }
    };

    match AnonymizationEngine::from_config(&config) {
        Ok(engine) => Some(engine),
        Err(e) => {
            eprintln!("❌ Failed to initialize engine: {e:#}");
            None
        }
    }
}
