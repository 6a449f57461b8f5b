//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "masquerade.toml")]
    pub output: String,

    /// Include example policies, conditions and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Masquerade configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your policies", self.output);
                println!("  2. For encryption rules, generate a key:");
                println!("     openssl rand -hex 32");
                println!("     and export it as MASQUERADE_DEFAULT_KEY (or put it in .env)");
                println!("  3. Validate configuration: masquerade validate-config");
                println!("  4. Try it: masquerade anonymize --field phone --value '+1-415-555-0100'");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# Masquerade Configuration File

[application]
log_level = "info"

[engine]
cache_ttl_seconds = 300
fallback = "deny"

[[policies]]
name = "Phone numbers"

[[policies.rules]]
name = "Mask phone numbers"
field = "phone"
pii_types = ["phone"]
technique = "masking"

[policies.rules.config.masking]
style = "smart"
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# Masquerade Configuration File
#
# Values of the form ${VAR_NAME} are substituted from the environment.
# Any setting can also be overridden with MASQUERADE_<SECTION>_<KEY>,
# e.g. MASQUERADE_ENGINE_FALLBACK=full_mask.

[application]
# trace, debug, info, warn, error
log_level = "info"

[engine]
# Evaluation cache
cache_ttl_seconds = 300
cache_capacity = 1000
# "full" clears the cache on any policy change, "scope" only drops
# entries for requesters inside the changed policy's scope
cache_invalidation = "full"

# Token vault entries kept per direction (least recently used are evicted)
vault_capacity = 100000

# Bound on each key retrieval
key_timeout_ms = 2000

# What to do when no rule applies: "deny" or "full_mask"
fallback = "deny"

[engine.audit]
enabled = false
log_path = "./audit/masquerade.log"
json_format = true
timeout_ms = 500

[logging]
local_enabled = false
local_path = "./logs"
# daily, hourly, never
local_rotation = "daily"

# Encryption keys: hex-encoded 32-byte AES keys
# [[keys]]
# id = "default"
# material = "${MASQUERADE_DEFAULT_KEY}"

# Global policy: everybody sees masked phone numbers
[[policies]]
id = "global-phones"
name = "Phone numbers"
priority = 0

[[policies.rules]]
name = "Mask phone numbers"
field = "phone"
pii_types = ["phone"]
technique = "masking"
strength = "medium"

[policies.rules.config.masking]
style = "smart"
preserve_last_digits = 4

# Analysts get consistent tokens instead, so joins still work
[[policies.rules]]
name = "Tokenize for analysts"
field = "phone"
pii_types = ["phone"]
technique = "tokenization"
reversible = false

[[policies.rules.conditions]]
type = "role"
predicate = { equals = "analyst" }

[policies.rules.config.tokenization]
format = "formatted"
namespace = "analytics"

# Anything else falls back to suppression
[policies.default_rule]
name = "Suppress unknown fields"
field = "*"
technique = "suppression"

# Organization policy: support staff at acme may reverse phone numbers
[[policies]]
id = "acme-support"
name = "Acme support"
scope = "organization"
scope_id = "acme"
priority = 10

[[policies.rules]]
name = "Encrypt for support"
field = "phone"
technique = "encryption"
reversible = true
strength = "high"

[[policies.rules.conditions]]
type = "role"
predicate = { in = ["support", "support_lead"] }

[policies.rules.config.encryption]
key_id = "default"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::tempdir;

    #[test]
    fn test_init_args_defaults() {
        let args = InitArgs {
            output: "masquerade.toml".to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.output, "masquerade.toml");
        assert!(!args.with_examples);
    }

    #[test]
    fn test_generate_minimal_config() {
        let config = parse_config(&InitArgs::generate_minimal_config()).unwrap();
        assert_eq!(config.policies.len(), 1);
    }

    #[test]
    fn test_generate_config_with_examples() {
        let config = parse_config(&InitArgs::generate_config_with_examples()).unwrap();
        assert_eq!(config.policies.len(), 2);
        assert!(config.policies[0].default_rule.is_some());
        assert!(config.keys.is_empty());
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("masquerade.toml");
        std::fs::write(&output, "existing").unwrap();

        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "existing");
    }
}
