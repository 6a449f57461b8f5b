//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Masquerade using clap.

pub mod commands;

use crate::config::{load_config, LoggingConfig};
use clap::{Parser, Subcommand};

/// Level used when neither `--log-level` nor a readable config sets one
pub const FALLBACK_LOG_LEVEL: &str = "warn";

/// Masquerade - policy-driven anonymization for phone-like PII
#[derive(Parser, Debug)]
#[command(name = "masquerade")]
#[command(version, about, long_about = None)]
#[command(author = "Masquerade Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "masquerade.toml", env = "MASQUERADE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MASQUERADE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level and sinks for this invocation
    ///
    /// `--log-level` wins over `application.log_level`. When the config
    /// cannot be loaded (missing file, `init`, invalid contents) logging
    /// stays console-only so the command itself can report the problem.
    pub fn logging_settings(&self) -> (String, LoggingConfig) {
        match load_config(&self.config) {
            Ok(config) => (
                self.log_level
                    .clone()
                    .unwrap_or(config.application.log_level),
                config.logging,
            ),
            Err(_) => (
                self.log_level
                    .clone()
                    .unwrap_or_else(|| FALLBACK_LOG_LEVEL.to_string()),
                LoggingConfig::console(),
            ),
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Anonymize one or more values for a request context
    Anonymize(commands::anonymize::AnonymizeArgs),

    /// Show which rule applies to a request context
    Evaluate(commands::evaluate::EvaluateArgs),

    /// Validate configuration file and its policies
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

impl Commands {
    /// Execute the selected command, returning the process exit code
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        match self {
            Self::Anonymize(args) => args.execute(config_path).await,
            Self::Evaluate(args) => args.execute(config_path).await,
            Self::ValidateConfig(args) => args.execute(config_path).await,
            Self::Init(args) => args.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_parse_anonymize() {
        let cli = Cli::parse_from(["masquerade", "anonymize", "--field", "phone", "--value", "5550100"]);
        assert_eq!(cli.config, "masquerade.toml");
        assert!(matches!(cli.command, Commands::Anonymize(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["masquerade", "--config", "custom.toml", "validate-config"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["masquerade", "--log-level", "debug", "init"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["masquerade", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["masquerade", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }

    #[test]
    fn test_logging_settings_from_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[application]\nlog_level = \"debug\"\n\n[logging]\nlocal_enabled = true\nlocal_path = \"./logs\"\nlocal_rotation = \"hourly\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::parse_from(["masquerade", "--config", path, "validate-config"]);
        let (level, logging) = cli.logging_settings();
        assert_eq!(level, "debug");
        assert!(logging.local_enabled);
        assert_eq!(logging.local_rotation, "hourly");

        let cli = Cli::parse_from(["masquerade", "--config", path, "--log-level", "error", "validate-config"]);
        let (level, logging) = cli.logging_settings();
        assert_eq!(level, "error");
        assert!(logging.local_enabled);
    }

    #[test]
    fn test_logging_settings_without_config() {
        let cli = Cli::parse_from(["masquerade", "--config", "/nonexistent/masquerade.toml", "init"]);
        let (level, logging) = cli.logging_settings();
        assert_eq!(level, FALLBACK_LOG_LEVEL);
        assert!(!logging.local_enabled);
    }

    #[test]
    fn test_cli_requires_value() {
        assert!(Cli::try_parse_from(["masquerade", "anonymize", "--field", "phone"]).is_err());
    }
}
