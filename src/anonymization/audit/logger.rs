//! File-backed audit sink

use super::{AuditEvent, AuditSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only audit log, one event per line
pub struct FileAuditLogger {
    log_path: PathBuf,
    json_format: bool,
    /// Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl FileAuditLogger {
    /// Create a new audit logger, creating the parent directory if needed
    pub fn new(log_path: PathBuf, json_format: bool) -> Result<Self> {
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log directory: {}", parent.display())
                })?;
            }
        }

        Ok(Self {
            log_path,
            json_format,
            write_lock: Mutex::new(()),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn format_line(&self, event: &AuditEvent) -> Result<String> {
        if self.json_format {
            return serde_json::to_string(event).context("Failed to serialize audit event");
        }

        let metadata = serde_json::to_string(&event.metadata)
            .context("Failed to serialize audit metadata")?;
        Ok(format!(
            "[{}] {} {}/{} actor={} resource={} outcome={} {}",
            event.timestamp.to_rfc3339(),
            event.severity,
            event.category,
            event.action,
            event.actor_id,
            event.resource,
            event.outcome,
            metadata
        ))
    }
}

#[async_trait]
impl AuditSink for FileAuditLogger {
    async fn log_event(&self, event: AuditEvent) -> Result<()> {
        let line = self.format_line(&event)?;

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await
            .with_context(|| format!("Failed to open audit log: {}", self.log_path.display()))?;

        file.write_all(format!("{line}\n").as_bytes())
            .await
            .context("Failed to write audit event")?;
        file.flush().await.context("Failed to flush audit log")?;

        Ok(())
    }
}
