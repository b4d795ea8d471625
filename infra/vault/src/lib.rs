//! Session-scoped encryption for transient client state.
//!
//! The vault protects JSON-serializable values kept in per-session storage (a browser tab's
//! transient storage, a session directory) so that casually inspecting the storage does not
//! reveal plaintext. It is not a secrets vault: anyone able to read the storage can also read
//! the seed and salt the key is derived from.
//!
//! ## Key Derivation
//!
//! Each session owns a random seed and a 128-bit salt, persisted in two storage slots the first
//! time they are needed. The key is derived with PBKDF2-HMAC-SHA256 (at least 100,000
//! iterations) on the blocking thread pool and cached in a [`KeyStore`] until
//! [`SessionVault::clear_key`] or until the seed or salt changes. Concurrent callers that miss
//! the cache share one derivation.
//!
//! ## Envelope Format & Versioning
//!
//! Every encryption returns a standard base64 string over:
//!
//! ```text
//! [V(1)][NONCE(12)][CIPHERTEXT(N)][TAG(16)]
//! ```
//!
//! `V = 0x01` identifies PBKDF2-HMAC-SHA256 + AES-256-GCM and is authenticated as associated
//! data. Envelopes with any other version are rejected.
//!
//! ## Nonce Policy
//!
//! A **random 96-bit nonce** is drawn for every encryption. Sessions are short-lived and
//! low-volume, so the probabilistic bound of random nonces is comfortable here.
//!
//! ## Failure Model
//!
//! Storage problems never fail an operation; the vault falls back to ephemeral session values
//! and reports [`SessionMode::Degraded`]. Missing randomness always fails. Every problem with an
//! envelope yields the same [`VaultError::Decryption`].
//!
//! ## Examples
//!
//! ```rust
//! use tabseal_vault::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Intake {
//!     step: u32,
//!     answer: String,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), VaultError> {
//! let tab = MemoryStorage::new();
//! let vault = SessionVault::builder().storage(tab.clone()).build()?;
//!
//! let intake = Intake { step: 2, answer: "since Tuesday".into() };
//! let envelope = vault.encrypt(&intake).await?;
//! tab.set("intake", envelope.as_str()).await?;
//!
//! // The cached key can go at any time; the next call re-derives it.
//! vault.clear_key();
//!
//! let stored = tab.get("intake").await?.unwrap_or_default();
//! let restored: Intake = vault.decrypt(stored).await?;
//! assert_eq!(intake, restored);
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod engine;
mod entropy;
mod error;
mod kdf;
mod salt;
mod seed;
mod types;

pub use builder::VaultBuilder;
pub use config::{DEFAULT_SALT_SLOT, DEFAULT_SEED_SLOT, MIN_ITERATIONS, VaultConfig};
pub use engine::SessionVault;
pub use entropy::{EntropySource, OsEntropy};
pub use error::{VaultError, VaultErrorExt};
pub use kdf::{DerivedKey, KeyStore, derive};
pub use salt::SessionSalt;
pub use seed::SessionSeed;
pub use types::{Aes, Envelope, Persistence, Provisioned, SessionMode};

pub mod prelude {
    pub use crate::config::VaultConfig;
    pub use crate::engine::SessionVault;
    pub use crate::entropy::{EntropySource, OsEntropy};
    pub use crate::error::{VaultError, VaultErrorExt};
    pub use crate::types::{Envelope, SessionMode};
    pub use tabseal_storage::{DirStorage, MemoryStorage, SessionStorage};
}
