//! Evaluate command implementation
//!
//! Shows which rule applies to a request context, and why.

use super::{build_engine, ContextArgs};
use clap::Args;

/// Arguments for the evaluate command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Print the full evaluation result as JSON
    #[arg(long)]
    pub json: bool,
}

impl EvaluateArgs {
    /// Execute the evaluate command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let Some(engine) = build_engine(config_path) else {
            return Ok(2);
        };

        let ctx = self.context.to_context();
        let evaluation = match engine.evaluate(&ctx).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                println!("❌ No rule applies: {e}");
                return Ok(1);
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
            return Ok(0);
        }

        println!("✅ Rule resolved");
        println!();
        println!(
            "  Policy: {} ({}, v{})",
            evaluation.policy.name, evaluation.policy.id, evaluation.policy.version
        );
        println!("  Rule: {} ({})", evaluation.rule.name, evaluation.rule.id);
        println!("  Technique: {}", evaluation.technique);
        println!("  Reversible: {}", evaluation.reversible);
        println!("  Score: {:.2}", evaluation.score);
        println!("  Confidence: {:.2}", evaluation.confidence);
        println!();
        println!("Reasoning:");
        for line in &evaluation.reasoning {
            println!("  - {line}");
        }
        println!();

        Ok(0)
    }
}
