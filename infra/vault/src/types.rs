use aes_gcm::Aes256Gcm;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Aliases ---

/// The envelope cipher: AES-256-GCM with 96-bit nonces.
pub type Aes = Aes256Gcm;

// --- Envelope format constants ---

/// Envelope version: PBKDF2-HMAC-SHA256 key, AES-256-GCM, 96-bit random nonce.
pub(crate) const ENVELOPE_VERSION_V1: u8 = 1;

/// Header layout: `[version: u8]`
pub(crate) const HEADER_LEN: usize = 1;

/// AEAD nonce length (96-bit).
pub(crate) const NONCE_LEN: usize = 12;

/// AEAD tag length (128-bit).
pub(crate) const TAG_LEN: usize = 16;

/// Session salt length (128-bit).
pub(crate) const SALT_LEN: usize = 16;

// --- Session state ---

/// Where a session value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Read from, or durably written to, session storage.
    Persisted,
    /// Generated for this call only because storage was unavailable.
    Ephemeral,
}

/// A session value together with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned<T> {
    pub value: T,
    pub persistence: Persistence,
}

impl<T> Provisioned<T> {
    pub(crate) const fn persisted(value: T) -> Self {
        Self { value, persistence: Persistence::Persisted }
    }

    pub(crate) const fn ephemeral(value: T) -> Self {
        Self { value, persistence: Persistence::Ephemeral }
    }

    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.persistence == Persistence::Ephemeral
    }
}

/// Health of the session as observed by the vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
    /// Seed and salt are persisted; envelopes stay decryptable for the whole session.
    #[default]
    Persistent,
    /// At least one call ran on an ephemeral seed or salt. Envelopes produced in this mode
    /// are likely undecryptable later, so callers should stop caching sensitive data.
    Degraded,
}

// --- Container ---

/// An encrypted, base64-encoded payload ready to be put into storage.
///
/// The decoded bytes use the following layout:
///
/// ```text
/// [V(1)][NONCE(12)][CIPHERTEXT(N)][TAG(16)]
/// ```
///
/// - `V` is the envelope version and is authenticated as associated data.
/// - The tag covers the version, nonce and ciphertext.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(String);

impl Envelope {
    pub(crate) fn encode(blob: &[u8]) -> Self {
        Self(STANDARD.encode(blob))
    }

    pub(crate) fn decode(encoded: &str) -> Option<Vec<u8>> {
        STANDARD.decode(encoded.trim()).ok()
    }

    /// Returns the envelope format version, or `None` if the text is not a valid envelope.
    #[must_use]
    pub fn version(&self) -> Option<u8> {
        Self::decode(&self.0).and_then(|blob| blob.first().copied())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope").field("len", &self.0.len()).finish()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Envelope {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Envelope {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<Envelope> for String {
    fn from(value: Envelope) -> Self {
        value.0
    }
}
