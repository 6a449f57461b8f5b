//! Typed per-rule technique configuration
//!
//! Every section has serde defaults so a rule only spells out what it
//! changes, e.g. in TOML:
//!
//! ```toml
//! [policies.rules.config.masking]
//! style = "smart"
//! preserve_last_digits = 4
//! ```

use serde::{Deserialize, Serialize};

/// Technique settings carried by a rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub masking: MaskingConfig,
    pub tokenization: TokenizationConfig,
    pub encryption: EncryptionConfig,
    pub generalization: GeneralizationConfig,
    pub suppression: SuppressionConfig,
}

/// Masking style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaskingStyle {
    /// Mask every digit
    Full,
    /// Keep configured prefixes and the trailing digits
    #[default]
    Partial,
    /// Canonical `+{cc}-***-***-{last4}` for NANP numbers, partial otherwise
    Smart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    pub style: MaskingStyle,
    pub mask_char: char,
    pub preserve_formatting: bool,
    pub preserve_country_code: bool,
    pub preserve_area_code: bool,
    pub preserve_last_digits: usize,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            style: MaskingStyle::Partial,
            mask_char: '*',
            preserve_formatting: true,
            preserve_country_code: true,
            preserve_area_code: false,
            preserve_last_digits: 4,
        }
    }
}

/// Token representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenFormat {
    /// Opaque UUID
    Uuid,
    /// Fake number with the same digit count
    Numeric,
    /// Fake number laid into the original punctuation
    #[default]
    Formatted,
}

impl TokenFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Numeric => "numeric",
            Self::Formatted => "formatted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizationConfig {
    pub format: TokenFormat,
    pub use_consistent_tokens: bool,
    /// Separates token spaces; equal values in different namespaces get different tokens
    pub namespace: Option<String>,
}

impl Default for TokenizationConfig {
    fn default() -> Self {
        Self {
            format: TokenFormat::Formatted,
            use_consistent_tokens: true,
            namespace: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub key_id: String,
    /// Derive a cosmetic digit display value; the reversible bundle is returned separately
    pub preserve_formatting: bool,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key_id: "default".to_string(),
            preserve_formatting: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralizationConfig {
    pub placeholder: char,
    pub keep_area_code: bool,
}

impl Default for GeneralizationConfig {
    fn default() -> Self {
        Self {
            placeholder: 'X',
            keep_area_code: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressionConfig {
    pub label: String,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            label: "[REDACTED]".to_string(),
        }
    }
}
