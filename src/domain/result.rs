//! Result type alias for Masquerade

use super::errors::MasqueradeError;

/// Result type alias for Masquerade operations
///
/// # Examples
///
/// ```
/// use masquerade::domain::result::Result;
/// use masquerade::domain::errors::MasqueradeError;
///
/// fn failing_function() -> Result<()> {
///     Err(MasqueradeError::PolicyValidation("name is required".to_string()))
/// }
/// assert!(failing_function().is_err());
/// ```
pub type Result<T> = std::result::Result<T, MasqueradeError>;
