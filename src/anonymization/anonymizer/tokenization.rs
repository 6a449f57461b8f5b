//! Tokenization anonymization strategy

use super::{rewrite_digits, Anonymizer, DigitLayout, TechniqueInput, TechniqueOutput};
use crate::anonymization::format::PhoneNumberFormat;
use crate::anonymization::models::{AnonymizationTechnique, TokenFormat, TokenizationConfig};
use crate::anonymization::quality::QualityScorer;
use crate::anonymization::vault::TokenVault;
use crate::domain::errors::TechniqueError;
use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Tokenization strategy - replaces values with vault-backed tokens
pub struct TokenizationAnonymizer {
    vault: Arc<TokenVault>,
    scorer: QualityScorer,
}

impl TokenizationAnonymizer {
    pub fn new(vault: Arc<TokenVault>, scorer: QualityScorer) -> Self {
        Self { vault, scorer }
    }

    /// Vault namespace for a configuration; tokens never cross formats
    pub fn namespace(config: &TokenizationConfig) -> String {
        format!(
            "tokenization:{}:{}",
            config.format.as_str(),
            config.namespace.as_deref().unwrap_or("default")
        )
    }
}

#[async_trait]
impl Anonymizer for TokenizationAnonymizer {
    fn technique(&self) -> AnonymizationTechnique {
        AnonymizationTechnique::Tokenization
    }

    async fn apply(&self, input: &TechniqueInput<'_>) -> Result<TechniqueOutput, TechniqueError> {
        let config = &input.config.tokenization;
        let format = input.format;

        // Without digits a format-preserving token would echo the value
        let token_format = if format.has_digits() {
            config.format
        } else {
            TokenFormat::Uuid
        };

        let issued = self.vault.issue(
            &Self::namespace(config),
            input.value,
            config.use_consistent_tokens,
            input.reversible,
            || mint(format, token_format),
        )?;

        let quality_score = self
            .scorer
            .token(format, &issued.token, config.use_consistent_tokens);

        let mut output = TechniqueOutput {
            token: input.reversible.then(|| issued.token.clone()),
            anonymized: issued.token,
            reversible: input.reversible,
            quality_score,
            ..TechniqueOutput::default()
        };
        output
            .details
            .insert("token_format".to_string(), json!(token_format.as_str()));
        output
            .details
            .insert("token_reused".to_string(), json!(issued.reused));
        Ok(output)
    }
}

/// Mint a fresh token in the requested format
fn mint(format: &PhoneNumberFormat, token_format: TokenFormat) -> String {
    match token_format {
        TokenFormat::Uuid => Uuid::new_v4().to_string(),
        TokenFormat::Numeric => numeric_token(format),
        TokenFormat::Formatted => formatted_token(format),
    }
}

/// `+{cc}` (when written) followed by a fake national number of the same length
fn numeric_token(format: &PhoneNumberFormat) -> String {
    let layout = DigitLayout::of(format);
    let national_len = layout.extension.start - layout.country.end;
    let national = fake_national(national_len, format.is_nanp());

    match (&format.country_code, layout.country.is_empty()) {
        (Some(cc), false) => format!("+{cc}{national}"),
        _ => national,
    }
}

/// Fake digits laid into the original punctuation layout; the country code is kept
fn formatted_token(format: &PhoneNumberFormat) -> String {
    let layout = DigitLayout::of(format);
    let national_len = layout.extension.start - layout.country.end;
    let mut national = fake_national(national_len, format.is_nanp()).into_bytes().into_iter();
    let mut rng = rand::thread_rng();

    rewrite_digits(&format.original, true, |index, digit| {
        if layout.country.contains(&index) {
            digit
        } else if layout.extension.contains(&index) {
            char::from(b'0' + rng.gen_range(0..10u8))
        } else {
            national.next().map_or('0', char::from)
        }
    })
}

/// Random digits whose area code and exchange (NANP) or first digit never start with 0/1
fn fake_national(len: usize, nanp: bool) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|i| {
            let leading = i == 0 || (nanp && i == 3);
            let digit = if leading {
                rng.gen_range(2..10u8)
            } else {
                rng.gen_range(0..10u8)
            };
            char::from(b'0' + digit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::format::PhoneParser;
    use crate::anonymization::models::RuleConfig;

    fn config(format: TokenFormat, consistent: bool) -> RuleConfig {
        RuleConfig {
            tokenization: TokenizationConfig {
                format,
                use_consistent_tokens: consistent,
                namespace: None,
            },
            ..RuleConfig::default()
        }
    }

    async fn tokenize(
        anonymizer: &TokenizationAnonymizer,
        value: &str,
        config: &RuleConfig,
        reversible: bool,
    ) -> TechniqueOutput {
        let format = PhoneParser::new().parse(value);
        anonymizer
            .apply(&TechniqueInput {
                value,
                format: &format,
                config,
                reversible,
            })
            .await
            .unwrap()
    }

    fn anonymizer() -> TokenizationAnonymizer {
        TokenizationAnonymizer::new(Arc::new(TokenVault::default()), QualityScorer::new())
    }

    #[test]
    fn test_numeric_token_shape() {
        let format = PhoneParser::new().parse("+1-415-555-0100");
        let token = numeric_token(&format);
        assert!(token.starts_with("+1"));
        let digits: Vec<u8> = token.bytes().filter(u8::is_ascii_digit).collect();
        assert_eq!(digits.len(), 11);
        assert!(digits[1] >= b'2' && digits[4] >= b'2');

        let domestic = numeric_token(&PhoneParser::new().parse("415-555-0100"));
        assert_eq!(domestic.len(), 10);
        assert!(domestic.as_bytes()[0] >= b'2');
    }

    #[test]
    fn test_formatted_token_keeps_layout() {
        let format = PhoneParser::new().parse("+1 (415) 555-0100");
        for _ in 0..20 {
            let token = formatted_token(&format);
            assert_eq!(token.len(), format.original.len());
            assert!(token.starts_with("+1 ("));
            assert_eq!(&token[7..9], ") ");
            assert_eq!(&token[12..13], "-");
            let area = token.as_bytes()[4];
            assert!((b'2'..=b'9').contains(&area));
        }
    }

    #[tokio::test]
    async fn test_consistent_tokens() {
        let anonymizer = anonymizer();
        let config = config(TokenFormat::Formatted, true);
        let first = tokenize(&anonymizer, "+1-415-555-0100", &config, false).await;
        let second = tokenize(&anonymizer, "+1-415-555-0100", &config, false).await;
        assert_eq!(first.anonymized, second.anonymized);
        assert_ne!(first.anonymized, "+1-415-555-0100");
        assert_eq!(second.details["token_reused"], json!(true));
        assert!(first.token.is_none());
    }

    #[tokio::test]
    async fn test_reversible_token_returned() {
        let anonymizer = anonymizer();
        let output = tokenize(&anonymizer, "+1-415-555-0100", &config(TokenFormat::Uuid, false), true).await;
        assert!(output.reversible);
        assert_eq!(output.token.as_deref(), Some(output.anonymized.as_str()));
        assert!(Uuid::parse_str(&output.anonymized).is_ok());
        assert_eq!(
            anonymizer.vault.reveal(&output.anonymized).as_deref(),
            Some("+1-415-555-0100")
        );
    }

    #[tokio::test]
    async fn test_text_values_fall_back_to_uuid() {
        let anonymizer = anonymizer();
        let output = tokenize(&anonymizer, "not a phone", &config(TokenFormat::Formatted, true), false).await;
        assert!(Uuid::parse_str(&output.anonymized).is_ok());
        assert_eq!(output.details["token_format"], json!("uuid"));
    }

    #[test]
    fn test_namespace() {
        let mut cfg = TokenizationConfig::default();
        assert_eq!(TokenizationAnonymizer::namespace(&cfg), "tokenization:formatted:default");
        cfg.namespace = Some("crm".to_string());
        cfg.format = TokenFormat::Numeric;
        assert_eq!(TokenizationAnonymizer::namespace(&cfg), "tokenization:numeric:crm");
    }
}
