//! Utility-preservation scoring
//!
//! Scores are in `0.0..=1.0`. Masking and generalization use positional
//! digit preservation plus a fixed bonus when the punctuation layout
//! survives; the other techniques are scored on the shape they keep.

use crate::anonymization::format::PhoneNumberFormat;

/// Bonus added when the output keeps the original punctuation layout
pub const FORMAT_PRESERVED_BONUS: f64 = 0.1;

/// Computes quality scores for anonymized outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Digits kept at the same position and value, over the original digit count,
    /// plus [`FORMAT_PRESERVED_BONUS`] when the layout is preserved; capped at 1.0
    pub fn positional(&self, original: &PhoneNumberFormat, anonymized: &str) -> f64 {
        let original_chars: Vec<char> = original.original.chars().collect();
        let anonymized_chars: Vec<char> = anonymized.chars().collect();

        let total_digits = original_chars.iter().filter(|c| c.is_ascii_digit()).count();
        if total_digits == 0 {
            return 0.0;
        }

        let preserved = original_chars
            .iter()
            .zip(anonymized_chars.iter())
            .filter(|(o, a)| o.is_ascii_digit() && o == a)
            .count();

        let mut score = preserved as f64 / total_digits as f64;
        if layout_preserved(&original.original, anonymized) {
            score += FORMAT_PRESERVED_BONUS;
        }
        score.min(1.0)
    }

    /// Score for a token replacement
    ///
    /// Consistent tokens keep referential utility (joins, counts); digit
    /// count and layout add further utility.
    pub fn token(&self, original: &PhoneNumberFormat, token: &str, consistent: bool) -> f64 {
        let mut score: f64 = 0.0;
        if consistent {
            score += 0.3;
        }
        let token_digits = token.chars().filter(char::is_ascii_digit).count();
        if original.has_digits() && token_digits == original.digit_count() {
            score += 0.3;
        }
        if layout_preserved(&original.original, token) {
            score += 0.2;
        }
        score.min(1.0)
    }

    /// Score for an encrypted value; only a format-preserving display keeps utility
    pub fn encrypted(&self, original: &PhoneNumberFormat, display: Option<&str>) -> f64 {
        match display {
            Some(display) if layout_preserved(&original.original, display) => 0.2,
            _ => 0.0,
        }
    }

    /// Suppressed values carry no utility
    pub fn suppressed(&self) -> f64 {
        0.0
    }
}

/// Same length and every non-digit character at the same position
fn layout_preserved(original: &str, anonymized: &str) -> bool {
    if original.is_empty() || original.chars().count() != anonymized.chars().count() {
        return false;
    }
    original
        .chars()
        .zip(anonymized.chars())
        .all(|(o, a)| o.is_ascii_digit() || o == a)
}
