//! Domain error and result types for Masquerade.
//!
//! All fallible library operations return [`Result<T, MasqueradeError>`]:
//!
//! ```rust
//! use masquerade::domain::{MasqueradeError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = masquerade::config::load_config("masquerade.toml")?;
//!     let _ = config;
//!     Ok(())
//! }
//! # let _ = example();
//! ```

pub mod errors;
pub mod result;

pub use errors::{KeyProviderError, MasqueradeError, TechniqueError};
pub use result::Result;
