//! Token vault and key provider
//!
//! Both are explicit objects owned by an engine instance; there is no
//! process-wide token map.

pub mod keys;
pub mod token_vault;

pub use keys::{KeyMaterial, KeyProvider, StaticKeyProvider, TimeoutKeyProvider, KEY_LEN};
pub use token_vault::{IssuedToken, TokenVault, VaultEntry, VaultStats, DEFAULT_VAULT_CAPACITY};
