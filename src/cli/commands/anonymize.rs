//! Anonymize command implementation
//!
//! Resolves the policy for the given context and anonymizes each value,
//! printing the results as JSON.

use super::{build_engine, ContextArgs};
use crate::anonymization::models::{AnonymizationResult, AnonymizationTechnique};
use clap::Args;

/// Arguments for the anonymize command
#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Value to anonymize (repeatable)
    #[arg(short, long = "value", required = true)]
    pub values: Vec<String>,

    /// Override the technique chosen by policy
    #[arg(short, long)]
    pub technique: Option<AnonymizationTechnique>,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

impl AnonymizeArgs {
    /// Execute the anonymize command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let Some(engine) = build_engine(config_path) else {
            return Ok(2);
        };

        let ctx = self.context.to_context();
        tracing::info!(
            field = %ctx.field,
            values = self.values.len(),
            technique = ?self.technique,
            "Anonymizing values"
        );

        let results = engine.anonymize_batch(&self.values, &ctx, self.technique).await;
        println!("{}", self.render(&results)?);

        let failed = results.iter().filter(|r| r.is_failure()).count();
        if failed > 0 {
            tracing::warn!(failed, total = results.len(), "Some values could not be anonymized");
            return Ok(1);
        }
        Ok(0)
    }

    fn render(&self, results: &[AnonymizationResult]) -> anyhow::Result<String> {
        let rendered = if self.compact {
            serde_json::to_string(results)?
        } else {
            serde_json::to_string_pretty(results)?
        };
        Ok(rendered)
    }
}
