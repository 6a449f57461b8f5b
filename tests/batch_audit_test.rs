//! Batch anonymization and audit reporting

use anyhow::bail;
use async_trait::async_trait;
use masquerade::anonymization::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use masquerade::anonymization::models::{
    AnonymizationRule, AnonymizationTechnique, EvaluationContext, PolicyDraft,
};
use masquerade::anonymization::vault::{KeyMaterial, StaticKeyProvider};
use masquerade::anonymization::{AnonymizationEngine, AuditConfig, EngineConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn log_event(&self, event: AuditEvent) -> anyhow::Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn log_event(&self, _event: AuditEvent) -> anyhow::Result<()> {
        bail!("audit backend unavailable")
    }
}

struct StalledSink;

#[async_trait]
impl AuditSink for StalledSink {
    async fn log_event(&self, _event: AuditEvent) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }
}

fn engine_with(config: EngineConfig) -> AnonymizationEngine {
    let keys = StaticKeyProvider::new().with_key("default", KeyMaterial::generate());
    AnonymizationEngine::new(config, Arc::new(keys)).unwrap()
}

fn engine() -> AnonymizationEngine {
    engine_with(EngineConfig::default())
}

fn ctx() -> EvaluationContext {
    EvaluationContext::builder("u1", "analyst", "phone").build()
}

fn values(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let engine = engine();
    let results = engine
        .anonymize_batch(
            &values(&["+14155550100", "", "+442012345678"]),
            &ctx(),
            Some(AnonymizationTechnique::Masking),
        )
        .await;

    assert_eq!(results.len(), 3);

    assert!(!results[0].is_failure());
    assert_eq!(results[0].anonymized, "+1******0100");
    assert!(results[0].metadata.format.is_some());

    let failed = &results[1];
    assert!(failed.is_failure());
    assert_eq!(failed.anonymized, "");
    assert_eq!(failed.quality_score, 0.0);
    assert!(!failed.reversible);
    assert!(failed.token.is_none());
    assert_eq!(failed.technique, AnonymizationTechnique::Masking);

    assert!(!results[2].is_failure());
    assert!(results[2].anonymized.starts_with("+44"));
    assert!(results[2].anonymized.ends_with("5678"));
    assert!(results[2].metadata.format.is_some());

    let stats = engine.statistics();
    assert_eq!(stats.anonymizations, 3);
    assert_eq!(stats.failed_anonymizations, 1);
}

#[tokio::test]
async fn test_batch_keeps_input_order() {
    let engine = engine();
    let inputs = values(&["+1-212-555-0101", "+1-212-555-0102", "+1-212-555-0103", "+1-212-555-0104"]);

    let results = engine
        .anonymize_batch(&inputs, &ctx(), Some(AnonymizationTechnique::Masking))
        .await;

    for (input, result) in inputs.iter().zip(&results) {
        assert_eq!(&result.original, input);
        assert_eq!(&result.anonymized[result.anonymized.len() - 4..], &input[input.len() - 4..]);
    }
}

#[tokio::test]
async fn test_batch_failure_uses_resolved_technique() {
    let engine = engine();
    engine
        .create_policy(
            PolicyDraft::new("phones").with_rule(AnonymizationRule::new(
                "suppress",
                "phone",
                AnonymizationTechnique::Suppression,
            )),
            "admin",
        )
        .unwrap();

    let results = engine.anonymize_batch(&values(&[""]), &ctx(), None).await;
    assert!(results[0].is_failure());
    assert_eq!(results[0].technique, AnonymizationTechnique::Suppression);
}

#[tokio::test]
async fn test_failing_sink_does_not_fail_operations() {
    let engine = engine().with_audit_sink(Arc::new(FailingSink));
    let result = engine
        .anonymize("+14155550100", &ctx(), Some(AnonymizationTechnique::Suppression))
        .await
        .unwrap();
    assert!(!result.anonymized.contains("4155550100"));
}

#[tokio::test]
async fn test_stalled_sink_is_bounded() {
    let config = EngineConfig {
        audit: AuditConfig {
            timeout_ms: 20,
            ..AuditConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = engine_with(config).with_audit_sink(Arc::new(StalledSink));

    let started = Instant::now();
    engine
        .anonymize("+14155550100", &ctx(), Some(AnonymizationTechnique::Masking))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_one_event_per_operation_without_plaintext() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine().with_audit_sink(Arc::clone(&sink) as Arc<dyn AuditSink>);
    engine
        .create_policy(
            PolicyDraft::new("phones").with_rule(
                AnonymizationRule::new("tokenize", "phone", AnonymizationTechnique::Tokenization)
                    .reversible(true),
            ),
            "admin",
        )
        .unwrap();

    let value = "+14155550100";
    engine.evaluate(&ctx()).await.unwrap();
    let result = engine.anonymize(value, &ctx(), None).await.unwrap();
    engine.decrypt(&result.token.unwrap(), "auditor").await.unwrap();

    let events = sink.events();
    let categories: Vec<_> = events.iter().map(|e| e.category).collect();
    assert_eq!(
        categories,
        vec![
            AuditCategory::PolicyEvaluation,
            AuditCategory::Anonymization,
            AuditCategory::Decryption,
        ]
    );
    assert!(events.iter().all(|e| e.outcome == AuditOutcome::Success));
    assert_eq!(events[2].actor_id, "auditor");

    for event in &events {
        let line = serde_json::to_string(event).unwrap();
        assert!(!line.contains(value), "plaintext leaked: {line}");
    }
}

#[tokio::test]
async fn test_failed_resolution_is_audited() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine().with_audit_sink(Arc::clone(&sink) as Arc<dyn AuditSink>);

    assert!(engine.evaluate(&ctx()).await.is_err());

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, AuditOutcome::Failure);
    assert!(events[0].metadata.contains_key("error"));
}

#[tokio::test]
async fn test_file_audit_logger_from_engine_config() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("audit").join("events.log");
    let config = EngineConfig {
        audit: AuditConfig {
            enabled: true,
            log_path: log_path.clone(),
            ..AuditConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = engine_with(config);

    engine
        .anonymize("+14155550100", &ctx(), Some(AnonymizationTechnique::Masking))
        .await
        .unwrap();
    engine.decrypt("not-a-token", "auditor").await.unwrap();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["category"], "anonymization");
    assert_eq!(lines[1]["category"], "decryption");
    assert_eq!(lines[1]["outcome"], "failure");
    assert!(!contents.contains("+14155550100"));
}
