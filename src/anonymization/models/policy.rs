//! Policy, rule and condition data models

use super::rule_config::RuleConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Scope level a policy is attached to
///
/// Variants are declared in inheritance order, so `Ord` walks
/// `global -> organization -> team -> user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyScope {
    /// Applies to every requester
    Global,
    /// Applies to members of one organization
    Organization,
    /// Applies to members of one team
    Team,
    /// Applies to a single user
    User,
}

impl PolicyScope {
    /// Scopes in the order they are walked during resolution
    pub const CHAIN: [PolicyScope; 4] = [
        PolicyScope::Global,
        PolicyScope::Organization,
        PolicyScope::Team,
        PolicyScope::User,
    ];
}

impl fmt::Display for PolicyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Organization => write!(f, "organization"),
            Self::Team => write!(f, "team"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Anonymization technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonymizationTechnique {
    /// Format-preserving masking
    Masking,
    /// Consistent token replacement
    Tokenization,
    /// Reversible authenticated encryption
    Encryption,
    /// Coarsen the value (keep leading structure only)
    Generalization,
    /// Replace the value with a label
    Suppression,
    /// Statistical noise (declared, not implemented)
    Perturbation,
}

impl fmt::Display for AnonymizationTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Masking => "masking",
            Self::Tokenization => "tokenization",
            Self::Encryption => "encryption",
            Self::Generalization => "generalization",
            Self::Suppression => "suppression",
            Self::Perturbation => "perturbation",
        };
        write!(f, "{name}")
    }
}

impl FromStr for AnonymizationTechnique {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "masking" | "mask" => Ok(Self::Masking),
            "tokenization" | "token" => Ok(Self::Tokenization),
            "encryption" | "encrypt" => Ok(Self::Encryption),
            "generalization" | "generalize" => Ok(Self::Generalization),
            "suppression" | "suppress" | "redact" => Ok(Self::Suppression),
            "perturbation" => Ok(Self::Perturbation),
            other => Err(format!("Unknown anonymization technique: {other}")),
        }
    }
}

/// Strength of the anonymization a rule requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Low,
    #[default]
    Medium,
    High,
}

/// Context attribute a condition is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Requester role
    Role,
    /// Data classification of the field
    Classification,
    /// `metadata[key]`, or the request purpose when no key is given
    Context,
    /// Evaluation timestamp
    Time,
    /// Requester location
    Location,
    /// `metadata[key]`, usually paired with a custom predicate
    Custom,
}

/// Closed set of condition operators
///
/// `Custom` names a predicate registered with the resolver; no
/// dynamic code is ever evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionPredicate {
    Equals(Value),
    NotEquals(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Greater(Value),
    Less(Value),
    Matches(String),
    Custom(String),
}

/// A single rule condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizationCondition {
    /// Which context attribute to read
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    /// Metadata key for `context` and `custom` conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Operator and operand
    pub predicate: ConditionPredicate,
}

impl AnonymizationCondition {
    /// Create a condition without a metadata key
    pub fn new(condition_type: ConditionType, predicate: ConditionPredicate) -> Self {
        Self {
            condition_type,
            key: None,
            predicate,
        }
    }

    /// Attach a metadata key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// An anonymization rule, owned by exactly one policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizationRule {
    /// Rule id, assigned on create when left empty
    #[serde(default)]
    pub id: String,

    pub name: String,

    /// Field name, or `*` / `any` as a wildcard
    pub field: String,

    #[serde(default)]
    pub pii_types: Vec<String>,

    pub technique: AnonymizationTechnique,

    #[serde(default)]
    pub strength: Strength,

    #[serde(default)]
    pub reversible: bool,

    #[serde(default)]
    pub conditions: Vec<AnonymizationCondition>,

    #[serde(default)]
    pub config: RuleConfig,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub priority: i32,
}

impl AnonymizationRule {
    /// Create an enabled rule with default settings
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        technique: AnonymizationTechnique,
    ) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            field: field.into(),
            pii_types: Vec::new(),
            technique,
            strength: Strength::default(),
            reversible: false,
            conditions: Vec::new(),
            config: RuleConfig::default(),
            enabled: true,
            priority: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_pii_types<I, S>(mut self, pii_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pii_types = pii_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_condition(mut self, condition: AnonymizationCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_config(mut self, config: RuleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }

    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = strength;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the rule field is a wildcard
    pub fn is_wildcard(&self) -> bool {
        let field = self.field.trim();
        field == "*" || field.eq_ignore_ascii_case("any")
    }
}

/// Policy version as `major.minor`
///
/// Updates bump the minor component, so versions strictly increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyVersion {
    pub major: u32,
    pub minor: u32,
}

impl PolicyVersion {
    /// Version assigned on creation
    pub const INITIAL: PolicyVersion = PolicyVersion { major: 1, minor: 0 };

    /// The next minor version
    pub fn next_minor(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }
}

impl Default for PolicyVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for PolicyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PolicyVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| format!("Invalid policy version '{s}', expected MAJOR.MINOR"))?;
        Ok(Self {
            major: major
                .parse()
                .map_err(|_| format!("Invalid major version in '{s}'"))?,
            minor: minor
                .parse()
                .map_err(|_| format!("Invalid minor version in '{s}'"))?,
        })
    }
}

impl Serialize for PolicyVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PolicyVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A stored anonymization policy
///
/// Policies are immutable by replacement: an update produces a new
/// minor version and the store keeps only the latest one per id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizationPolicy {
    pub id: String,
    pub name: String,
    pub version: PolicyVersion,
    pub scope: PolicyScope,
    pub scope_id: Option<String>,
    pub enabled: bool,
    pub priority: i32,
    pub rules: Vec<AnonymizationRule>,
    pub default_rule: Option<AnonymizationRule>,
    pub data_classifications: Vec<String>,
    /// Start of the applicability window; `None` means always effective
    pub effective_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AnonymizationPolicy {
    /// Whether the policy may be considered at `now` for `classification`
    pub fn is_applicable(&self, now: DateTime<Utc>, classification: Option<&str>) -> bool {
        self.inapplicable_reason(now, classification).is_none()
    }

    /// Reason the policy is skipped, if any
    pub fn inapplicable_reason(
        &self,
        now: DateTime<Utc>,
        classification: Option<&str>,
    ) -> Option<String> {
        if !self.enabled {
            return Some("disabled".to_string());
        }
        if let Some(effective) = self.effective_date.filter(|effective| *effective > now) {
            return Some(format!("not effective until {}", effective.to_rfc3339()));
        }
        if let Some(expiration) = self.expiration_date {
            if now >= expiration {
                return Some(format!("expired at {}", expiration.to_rfc3339()));
            }
        }
        if !self.data_classifications.is_empty() {
            let matches = classification.is_some_and(|c| {
                self.data_classifications
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(c))
            });
            if !matches {
                return Some(format!(
                    "classification {:?} not in {:?}",
                    classification.unwrap_or("<none>"),
                    self.data_classifications
                ));
            }
        }
        None
    }

    /// Total number of rules including the default rule
    pub fn rule_count(&self) -> usize {
        self.rules.len() + usize::from(self.default_rule.is_some())
    }
}

/// Input for creating a policy
///
/// This is also the shape of `[[policies]]` entries in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDraft {
    /// Optional explicit id; a UUID is assigned when absent
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(default = "default_scope")]
    pub scope: PolicyScope,

    #[serde(default)]
    pub scope_id: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub rules: Vec<AnonymizationRule>,

    #[serde(default)]
    pub default_rule: Option<AnonymizationRule>,

    #[serde(default)]
    pub data_classifications: Vec<String>,

    #[serde(default)]
    pub effective_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
}

impl PolicyDraft {
    /// Create a global draft with no rules
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            scope: PolicyScope::Global,
            scope_id: None,
            enabled: true,
            priority: 0,
            rules: Vec::new(),
            default_rule: None,
            data_classifications: Vec::new(),
            effective_date: None,
            expiration_date: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn scoped(mut self, scope: PolicyScope, scope_id: impl Into<String>) -> Self {
        self.scope = scope;
        self.scope_id = Some(scope_id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_rule(mut self, rule: AnonymizationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_default_rule(mut self, rule: AnonymizationRule) -> Self {
        self.default_rule = Some(rule);
        self
    }

    pub fn with_classifications<I, S>(mut self, classifications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_classifications = classifications.into_iter().map(Into::into).collect();
        self
    }

    pub fn effective_between(
        mut self,
        from: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.effective_date = Some(from);
        self.expiration_date = until;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Partial update of a policy; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub name: Option<String>,
    pub scope: Option<PolicyScope>,
    pub scope_id: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
    pub rules: Option<Vec<AnonymizationRule>>,
    pub default_rule: Option<Option<AnonymizationRule>>,
    pub data_classifications: Option<Vec<String>>,
    pub effective_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<Option<DateTime<Utc>>>,
}

fn default_true() -> bool {
    true
}

fn default_scope() -> PolicyScope {
    PolicyScope::Global
}
