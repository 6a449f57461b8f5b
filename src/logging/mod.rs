//! Logging and observability
//!
//! Structured logging built on `tracing`: console output plus an optional
//! JSON file layer with rotation. Values passing through the engine are
//! never logged in clear.
//!
//! # Example
//!
//! ```no_run
//! use masquerade::logging::init_logging;
//! use masquerade::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(policy_id = "phones", "Policy created");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a policy mutation
///
/// # Example
///
/// ```no_run
/// use masquerade::log_policy_change;
///
/// log_policy_change!("created", "policy-1", "1.0", "admin");
/// ```
#[macro_export]
macro_rules! log_policy_change {
    ($action:expr, $policy_id:expr, $version:expr, $actor:expr) => {
        tracing::info!(
            action = $action,
            policy_id = %$policy_id,
            version = %$version,
            actor = %$actor,
            "Policy changed"
        );
    };
}

/// Log the outcome of a batch
///
/// # Example
///
/// ```no_run
/// use masquerade::log_batch_complete;
/// use std::time::Duration;
///
/// log_batch_complete!(10, 1, Duration::from_millis(12));
/// ```
#[macro_export]
macro_rules! log_batch_complete {
    ($total:expr, $failed:expr, $duration:expr) => {
        tracing::debug!(
            total = $total,
            failed = $failed,
            duration_ms = $duration.as_millis() as u64,
            "Batch anonymization completed"
        );
    };
}
