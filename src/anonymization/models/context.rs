//! Evaluation context supplied by the caller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Who is asking, for which field, and when
///
/// The engine consumes role and classification as given; it never
/// computes them. Contexts are never persisted.
///
/// # Examples
///
/// ```
/// use masquerade::anonymization::models::EvaluationContext;
///
/// let ctx = EvaluationContext::builder("user-1", "analyst", "phone")
///     .organization("org-1")
///     .classification("confidential")
///     .pii_type("phone")
///     .build();
/// assert_eq!(ctx.organization_id.as_deref(), Some("org-1"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub user_id: String,
    pub role: String,
    pub organization_id: Option<String>,
    pub team_id: Option<String>,
    pub data_classification: Option<String>,
    pub field: String,
    pub data_type: String,
    pub pii_types: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub location: Option<String>,
    pub purpose: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl EvaluationContext {
    /// Start building a context
    pub fn builder(
        user_id: impl Into<String>,
        role: impl Into<String>,
        field: impl Into<String>,
    ) -> EvaluationContextBuilder {
        EvaluationContextBuilder::new(user_id, role, field)
    }
}

/// Builder for [`EvaluationContext`]
#[derive(Debug, Clone)]
pub struct EvaluationContextBuilder {
    context: EvaluationContext,
}

impl EvaluationContextBuilder {
    /// Creates a builder with the required attributes; the timestamp defaults to now
    pub fn new(user_id: impl Into<String>, role: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            context: EvaluationContext {
                user_id: user_id.into(),
                role: role.into(),
                organization_id: None,
                team_id: None,
                data_classification: None,
                field: field.into(),
                data_type: "string".to_string(),
                pii_types: Vec::new(),
                timestamp: Utc::now(),
                location: None,
                purpose: None,
                metadata: BTreeMap::new(),
            },
        }
    }

    pub fn organization(mut self, organization_id: impl Into<String>) -> Self {
        self.context.organization_id = Some(organization_id.into());
        self
    }

    pub fn team(mut self, team_id: impl Into<String>) -> Self {
        self.context.team_id = Some(team_id.into());
        self
    }

    pub fn classification(mut self, classification: impl Into<String>) -> Self {
        self.context.data_classification = Some(classification.into());
        self
    }

    pub fn data_type(mut self, data_type: impl Into<String>) -> Self {
        self.context.data_type = data_type.into();
        self
    }

    pub fn pii_type(mut self, pii_type: impl Into<String>) -> Self {
        self.context.pii_types.push(pii_type.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.context.timestamp = timestamp;
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.context.location = Some(location.into());
        self
    }

    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.context.purpose = Some(purpose.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> EvaluationContext {
        self.context
    }
}
