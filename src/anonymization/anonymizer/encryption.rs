//! Reversible authenticated encryption
//!
//! Values are sealed with AES-256-GCM under a key fetched from the
//! [`KeyProvider`] on every call, with the key id bound as associated data.
//! The reversible artifact is the bundle `hex(iv):hex(ciphertext):hex(tag)`.
//!
//! With `preserve_formatting` the visible value is a keyed hash of the
//! bundle laid into the original digit layout. It is cosmetic only: the
//! bundle is what `decrypt` accepts, and it is returned in `token`.

use super::{rewrite_digits, Anonymizer, TechniqueInput, TechniqueOutput};
use crate::anonymization::models::AnonymizationTechnique;
use crate::anonymization::quality::QualityScorer;
use crate::anonymization::vault::{KeyMaterial, KeyProvider, TokenVault};
use crate::domain::errors::TechniqueError;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;

/// AES-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// A nonce that has never been used
///
/// Only [`FreshNonce::generate`] creates one, and sealing consumes it, so
/// the same nonce value cannot be handed to the cipher twice.
pub struct FreshNonce([u8; NONCE_LEN]);

impl FreshNonce {
    /// Draw 96 random bits from the OS generator
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn into_bytes(self) -> [u8; NONCE_LEN] {
        self.0
    }
}

/// Encrypt `plaintext` into a bundle, consuming `nonce`
pub fn seal(
    key: &KeyMaterial,
    key_id: &str,
    nonce: FreshNonce,
    plaintext: &str,
) -> Result<String, TechniqueError> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| TechniqueError::Encryption(e.to_string()))?;

    let iv = nonce.into_bytes();
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext.as_bytes(),
                aad: key_id.as_bytes(),
            },
        )
        .map_err(|e| TechniqueError::Encryption(e.to_string()))?;

    // aes-gcm appends the tag to the ciphertext
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    Ok(format!(
        "{}:{}:{}",
        hex::encode(iv),
        hex::encode(ciphertext),
        hex::encode(tag)
    ))
}

/// Decrypt a bundle produced by [`seal`]
///
/// # Errors
///
/// `Encryption` when the bundle is malformed or fails authentication
/// (wrong key, wrong key id, tampered data).
pub fn open(key: &KeyMaterial, key_id: &str, bundle: &str) -> Result<String, TechniqueError> {
    let malformed = || TechniqueError::Encryption("malformed ciphertext bundle".to_string());

    let mut parts = bundle.trim().split(':');
    let (Some(iv), Some(ciphertext), Some(tag), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let iv = hex::decode(iv).map_err(|_| malformed())?;
    let mut sealed = hex::decode(ciphertext).map_err(|_| malformed())?;
    let tag = hex::decode(tag).map_err(|_| malformed())?;
    if iv.len() != NONCE_LEN || tag.len() != TAG_LEN {
        return Err(malformed());
    }
    sealed.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| TechniqueError::Encryption(e.to_string()))?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: &sealed,
                aad: key_id.as_bytes(),
            },
        )
        .map_err(|_| TechniqueError::Encryption("authentication failed".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|_| TechniqueError::Encryption("plaintext is not UTF-8".to_string()))
}

/// Deterministic digits derived from `HMAC-SHA256(key, bundle)`
fn display_digits(key: &KeyMaterial, bundle: &str, count: usize) -> Result<Vec<char>, TechniqueError> {
    let mut digits = Vec::with_capacity(count);
    let mut block: u32 = 0;
    while digits.len() < count {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key.expose())
            .map_err(|e| TechniqueError::Encryption(e.to_string()))?;
        mac.update(&block.to_be_bytes());
        mac.update(bundle.as_bytes());
        let output = mac.finalize().into_bytes();
        digits.extend(output.iter().map(|b| char::from(b'0' + b % 10)));
        block += 1;
    }
    digits.truncate(count);
    Ok(digits)
}

/// Encryption strategy - AES-256-GCM with provider-supplied keys
pub struct EncryptionAnonymizer {
    vault: Arc<TokenVault>,
    keys: Arc<dyn KeyProvider>,
    scorer: QualityScorer,
}

impl EncryptionAnonymizer {
    pub fn new(vault: Arc<TokenVault>, keys: Arc<dyn KeyProvider>, scorer: QualityScorer) -> Self {
        Self { vault, keys, scorer }
    }
}

#[async_trait]
impl Anonymizer for EncryptionAnonymizer {
    fn technique(&self) -> AnonymizationTechnique {
        AnonymizationTechnique::Encryption
    }

    async fn apply(&self, input: &TechniqueInput<'_>) -> Result<TechniqueOutput, TechniqueError> {
        let config = &input.config.encryption;
        if config.key_id.trim().is_empty() {
            return Err(TechniqueError::InvalidConfig(
                "encryption key_id must not be empty".to_string(),
            ));
        }

        // Provider failures propagate; there is no plaintext fallback
        let key = self.keys.get_key(&config.key_id).await?;
        let bundle = seal(&key, &config.key_id, FreshNonce::generate(), input.value)?;

        let display = if config.preserve_formatting && input.format.has_digits() {
            let mut digits = display_digits(&key, &bundle, input.format.digit_count())?.into_iter();
            Some(rewrite_digits(&input.format.original, true, |_, _| {
                digits.next().unwrap_or('0')
            }))
        } else {
            None
        };

        if input.reversible {
            self.vault.register_encrypted(&bundle, &config.key_id);
        }

        let quality_score = self.scorer.encrypted(input.format, display.as_deref());

        let mut output = TechniqueOutput {
            token: input.reversible.then(|| bundle.clone()),
            anonymized: display.unwrap_or(bundle),
            reversible: input.reversible,
            quality_score,
            ..TechniqueOutput::default()
        };
        output.details.insert("key_id".to_string(), json!(config.key_id));
        output
            .details
            .insert("algorithm".to_string(), json!("AES-256-GCM"));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::format::PhoneParser;
    use crate::anonymization::models::{EncryptionConfig, RuleConfig};
    use crate::anonymization::vault::{StaticKeyProvider, VaultEntry};
    use crate::domain::errors::KeyProviderError;

    fn anonymizer() -> (EncryptionAnonymizer, Arc<TokenVault>) {
        let vault = Arc::new(TokenVault::default());
        let keys = StaticKeyProvider::new().with_key("default", KeyMaterial::generate());
        (
            EncryptionAnonymizer::new(Arc::clone(&vault), Arc::new(keys), QualityScorer::new()),
            vault,
        )
    }

    async fn encrypt(
        anonymizer: &EncryptionAnonymizer,
        value: &str,
        config: EncryptionConfig,
        reversible: bool,
    ) -> Result<TechniqueOutput, TechniqueError> {
        let format = PhoneParser::new().parse(value);
        let config = RuleConfig {
            encryption: config,
            ..RuleConfig::default()
        };
        anonymizer
            .apply(&TechniqueInput {
                value,
                format: &format,
                config: &config,
                reversible,
            })
            .await
    }

    #[test]
    fn test_seal_open_round_trip() {
        let key = KeyMaterial::generate();
        let bundle = seal(&key, "default", FreshNonce::generate(), "+1-415-555-0100").unwrap();
        let parts: Vec<&str> = bundle.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), NONCE_LEN * 2);
        assert_eq!(parts[2].len(), TAG_LEN * 2);
        assert_eq!(open(&key, "default", &bundle).unwrap(), "+1-415-555-0100");
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let key = KeyMaterial::generate();
        let a = seal(&key, "k", FreshNonce::generate(), "same").unwrap();
        let b = seal(&key, "k", FreshNonce::generate(), "same").unwrap();
        assert_ne!(a.split(':').next(), b.split(':').next());
    }

    #[test]
    fn test_open_rejects_wrong_key_id_and_tampering() {
        let key = KeyMaterial::generate();
        let bundle = seal(&key, "k1", FreshNonce::generate(), "secret").unwrap();
        assert!(open(&key, "k2", &bundle).is_err());
        assert!(open(&KeyMaterial::generate(), "k1", &bundle).is_err());

        let parts: Vec<&str> = bundle.split(':').collect();
        let mut ciphertext = hex::decode(parts[1]).unwrap();
        ciphertext[0] ^= 0x01;
        let tampered = format!("{}:{}:{}", parts[0], hex::encode(ciphertext), parts[2]);
        assert!(open(&key, "k1", &tampered).is_err());
        assert!(open(&key, "k1", "not-a-bundle").is_err());
    }

    #[tokio::test]
    async fn test_reversible_registers_bundle() {
        let (anonymizer, vault) = anonymizer();
        let output = encrypt(&anonymizer, "+1-415-555-0100", EncryptionConfig::default(), true)
            .await
            .unwrap();
        let token = output.token.unwrap();
        assert_eq!(output.anonymized, token);
        assert_eq!(
            vault.lookup(&token),
            Some(VaultEntry::Encrypted {
                key_id: "default".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_preserve_formatting_display() {
        let (anonymizer, _) = anonymizer();
        let config = EncryptionConfig {
            preserve_formatting: true,
            ..EncryptionConfig::default()
        };
        let output = encrypt(&anonymizer, "+1-415-555-0100", config, true).await.unwrap();
        assert_eq!(output.anonymized.len(), "+1-415-555-0100".len());
        assert_eq!(&output.anonymized[..1], "+");
        assert_eq!(output.anonymized.matches('-').count(), 3);
        assert_ne!(Some(&output.anonymized), output.token.as_ref());
        assert!((output.quality_score - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_key_is_hard_error() {
        let (anonymizer, _) = anonymizer();
        let config = EncryptionConfig {
            key_id: "missing".to_string(),
            ..EncryptionConfig::default()
        };
        let err = encrypt(&anonymizer, "+1-415-555-0100", config, true).await.unwrap_err();
        assert!(matches!(
            err,
            TechniqueError::KeyProvider(KeyProviderError::KeyNotFound(_))
        ));
    }
}
