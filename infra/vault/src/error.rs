//! # Vault Errors
//!
//! This module defines the [`VaultError`] enum used throughout the vault crate for reporting
//! cryptographic, encoding, and configuration failures.

use std::borrow::Cow;
use tabseal_storage::StorageError;

/// A specialized [`VaultError`] enum for vault-related failures.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The execution context has no usable random source.
    ///
    /// Fatal for the call. The vault never falls back to storing plaintext.
    #[error("Cryptography unavailable{}: {message}", format_context(.context))]
    CryptoUnavailable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The envelope could not be opened.
    ///
    /// Wrong key, tampered or truncated data, unknown version and non-JSON plaintext all
    /// collapse into this single variant. The envelope is unrecoverable and should be
    /// discarded.
    #[error("decryption failed")]
    Decryption,

    /// The payload could not be serialized to JSON. Raised before any cryptographic work.
    #[error("Encoding error{}: {source}", format_context(.context))]
    Encoding { source: serde_json::Error, context: Option<Cow<'static, str>> },

    /// Failure during the AEAD encryption itself.
    #[error("Encryption error{}: {message}", format_context(.context))]
    Encryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Failure when the vault or builder is incorrectly configured.
    #[error("Invalid configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Session storage failure surfaced by an explicit teardown.
    ///
    /// Encrypt and decrypt never return this: they degrade to ephemeral session values.
    #[error("Storage error{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal vault error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Attaches human-readable context to vault results.
pub trait VaultErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, VaultError>;
}

impl<T> VaultErrorExt<T> for Result<T, VaultError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                VaultError::CryptoUnavailable { context: c, .. }
                | VaultError::Encoding { context: c, .. }
                | VaultError::Encryption { context: c, .. }
                | VaultError::InvalidConfiguration { context: c, .. }
                | VaultError::Storage { context: c, .. }
                | VaultError::Internal { context: c, .. } => *c = Some(context.into()),
                VaultError::Decryption => {},
            }
            e
        })
    }
}

impl<T> VaultErrorExt<T> for Result<T, serde_json::Error> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, VaultError> {
        self.map_err(|source| VaultError::Encoding { source, context: Some(context.into()) })
    }
}

impl<T> VaultErrorExt<T> for Result<T, StorageError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, VaultError> {
        self.map_err(|source| VaultError::Storage { source, context: Some(context.into()) })
    }
}

impl From<StorageError> for VaultError {
    #[inline]
    fn from(source: StorageError) -> Self {
        Self::Storage { source, context: None }
    }
}

impl From<&'static str> for VaultError {
    #[inline]
    fn from(s: &'static str) -> Self {
        Self::Internal { message: Cow::Borrowed(s), context: None }
    }
}

impl From<String> for VaultError {
    #[inline]
    fn from(s: String) -> Self {
        Self::Internal { message: Cow::Owned(s), context: None }
    }
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_error_carries_no_cause() {
        let err: Result<(), VaultError> = Err(VaultError::Decryption);
        let err = err.context("authentication tag mismatch").unwrap_err();

        assert_eq!(err.to_string(), "decryption failed");
    }

    #[test]
    fn test_context_is_rendered() {
        let err: Result<(), VaultError> = Err("boom".into());
        let err = err.context("while deriving").unwrap_err();

        assert_eq!(err.to_string(), "Internal vault error (while deriving): boom");
    }
}
