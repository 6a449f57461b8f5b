//! Validate config command implementation
//!
//! Loads the configuration and registers every declared policy with a
//! throwaway engine, so policy errors surface before deployment.

use crate::anonymization::AnonymizationEngine;
use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let engine = match AnonymizationEngine::from_config(&config) {
            Ok(engine) => {
                println!("✅ All policies registered");
                engine
            }
            Err(e) => {
                println!("❌ Policy or key validation failed");
                println!("   Error: {e:#}");
                return Ok(2);
            }
        };

        let stats = engine.statistics();
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Keys: {}", config.keys.len());
        println!("  Policies: {}", stats.policy_count);
        for (scope, count) in &stats.policy_counts_by_scope {
            println!("    {scope}: {count}");
        }
        println!("  Rules: {}", stats.rule_count);
        println!(
            "  Cache: {} entries, {}s TTL, {:?} invalidation",
            config.engine.cache_capacity, config.engine.cache_ttl_seconds, config.engine.cache_invalidation
        );
        println!("  Fallback: {:?}", config.engine.fallback);
        println!(
            "  Audit: {}",
            if config.engine.audit.enabled {
                config.engine.audit.log_path.display().to_string()
            } else {
                "disabled".to_string()
            }
        );
        println!();

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_valid_config() {
        let file = write_config(
            r#"
[[policies]]
name = "phones"

[[policies.rules]]
name = "mask"
field = "phone"
technique = "masking"
"#,
        );
        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_policy_without_rules_rejected() {
        let file = write_config("[[policies]]\nname = \"empty\"\n");
        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
