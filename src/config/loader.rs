//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::MasqueradeConfig;
use crate::domain::errors::MasqueradeError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into MasqueradeConfig
/// 4. Applies environment variable overrides (MASQUERADE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `MasqueradeError::Configuration` if:
/// - File cannot be read
/// - A referenced environment variable is not set
/// - TOML parsing fails
/// - An override value cannot be parsed
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use masquerade::config::load_config;
///
/// let config = load_config("masquerade.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MasqueradeConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MasqueradeError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MasqueradeError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parse configuration text; same pipeline as [`load_config`] minus the file read
pub fn parse_config(contents: &str) -> Result<MasqueradeConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: MasqueradeConfig = toml::from_str(&contents)
        .map_err(|e| MasqueradeError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        MasqueradeError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is a valid literal")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = env_var_pattern();
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(MasqueradeError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using MASQUERADE_* prefix
///
/// Environment variables follow the pattern: MASQUERADE_<SECTION>_<KEY>
/// For example: MASQUERADE_APPLICATION_LOG_LEVEL, MASQUERADE_ENGINE_FALLBACK
fn apply_env_overrides(config: &mut MasqueradeConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("MASQUERADE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Engine and audit overrides
    config
        .engine
        .apply_env_overrides()
        .map_err(|e| MasqueradeError::Configuration(format!("{e:#}")))?;

    // Logging overrides
    if let Ok(val) = std::env::var("MASQUERADE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("MASQUERADE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("MASQUERADE_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
