//! Policy management and resolution
//!
//! - [`PolicyStore`]: versioned in-memory repository with a scope index
//! - [`PolicyResolver`]: scope-chain walk, rule scoring and tie-breaking
//! - [`EvaluationCache`]: TTL-bounded memo of resolver outcomes
//! - [`ConditionEvaluator`]: closed set of condition operators

pub mod cache;
pub mod conditions;
pub mod resolver;
pub mod store;

pub use cache::{CacheKey, EvaluationCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
pub use conditions::{ConditionEvaluator, CustomPredicate, PatternCache, PredicateRegistry};
pub use resolver::PolicyResolver;
pub use store::{validate_policy, PolicyStore};
