//! Anonymization data models

pub mod context;
pub mod policy;
pub mod result;
pub mod rule_config;

pub use context::{EvaluationContext, EvaluationContextBuilder};
pub use policy::{
    AnonymizationCondition, AnonymizationPolicy, AnonymizationRule, AnonymizationTechnique,
    ConditionPredicate, ConditionType, PolicyDraft, PolicyScope, PolicyUpdate, PolicyVersion,
    Strength,
};
pub use result::{AnonymizationMetadata, AnonymizationResult, PolicyEvaluationResult};
pub use rule_config::{
    EncryptionConfig, GeneralizationConfig, MaskingConfig, MaskingStyle, RuleConfig,
    SuppressionConfig, TokenFormat, TokenizationConfig,
};
