use aead::inout::InOutBuf;
use aead::{AeadInOut, Nonce};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tabseal_storage::SessionStorage;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::builder::VaultBuilder;
use crate::config::VaultConfig;
use crate::entropy::EntropySource;
use crate::error::{VaultError, VaultErrorExt};
use crate::kdf::{DerivedKey, KeyStore};
use crate::salt::SaltProvider;
use crate::seed::SeedProvider;
use crate::types::{
    Aes, ENVELOPE_VERSION_V1, Envelope, HEADER_LEN, NONCE_LEN, Persistence, SessionMode, TAG_LEN,
};

#[derive(Debug)]
pub(crate) struct VaultInner<S: SessionStorage> {
    pub(crate) config: VaultConfig,
    pub(crate) entropy: Arc<dyn EntropySource>,
    pub(crate) seeds: SeedProvider<S>,
    pub(crate) salts: SaltProvider<S>,
    pub(crate) keys: KeyStore,
    pub(crate) degraded: AtomicBool,
}

/// Session-scoped encryption engine.
///
/// `SessionVault` turns JSON-serializable values into opaque [`Envelope`]s and back. The key is
/// derived from a per-session seed and salt held in the session storage `S`, and cached in
/// memory until [`SessionVault::clear_key`] or [`SessionVault::end_session`].
///
/// The handle wraps its state in an [`Arc`]: clones share the same key cache and session.
///
/// ### Storage failures
/// Encrypt and decrypt never fail because of storage. When the seed or salt cannot be
/// persisted the call runs on ephemeral values, the vault switches to
/// [`SessionMode::Degraded`], and envelopes produced from then on will probably not open later.
///
/// ### Example
/// ```rust
/// use tabseal_vault::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), VaultError> {
/// let tab = MemoryStorage::new();
/// let vault = SessionVault::builder().storage(tab).build()?;
///
/// let envelope = vault.encrypt(&vec![1, 2, 3]).await?;
/// let restored: Vec<i32> = vault.decrypt(&envelope).await?;
///
/// assert_eq!(restored, [1, 2, 3]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionVault<S: SessionStorage> {
    pub(crate) inner: Arc<VaultInner<S>>,
}

impl<S: SessionStorage> Clone for SessionVault<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

/// Borrowed view of a decoded envelope.
struct Parts<'a> {
    header: &'a [u8],
    nonce: &'a [u8],
    ciphertext: &'a [u8],
    tag: &'a [u8],
}

impl<S: SessionStorage> SessionVault<S> {
    /// Returns a new [`VaultBuilder`] to configure the vault.
    #[must_use]
    pub fn builder() -> VaultBuilder<S> {
        VaultBuilder::new()
    }

    /// Encrypts `data` as JSON into a fresh envelope.
    ///
    /// Every call draws a new random nonce, so identical inputs give different envelopes.
    ///
    /// # Errors
    /// * [`VaultError::CryptoUnavailable`] If the entropy source fails. Checked before storage
    ///   is touched.
    /// * [`VaultError::Encoding`] If `data` cannot be serialized to JSON.
    /// * [`VaultError::Encryption`] If the AEAD encryption fails.
    /// * [`VaultError::Internal`] If key derivation could not run.
    pub async fn encrypt<T>(&self, data: &T) -> Result<Envelope, VaultError>
    where
        T: Serialize + ?Sized,
    {
        self.inner.entropy.ensure_available()?;

        let plaintext = Zeroizing::new(serde_json::to_vec(data).context("JSON encoding failed")?);
        let key = self.current_key().await?;
        let nonce = self.next_nonce()?;

        let blob = Self::seal(key.cipher(), &nonce, &plaintext)?;
        Ok(Envelope::encode(&blob))
    }

    /// Opens an envelope produced in the current session and parses its JSON into `T`.
    ///
    /// # Errors
    /// * [`VaultError::CryptoUnavailable`] If the entropy source fails.
    /// * [`VaultError::Decryption`] For any problem with the envelope itself: bad encoding,
    ///   unknown version, wrong session, tampering, or a plaintext that does not parse as `T`.
    /// * [`VaultError::Internal`] If key derivation could not run.
    pub async fn decrypt<T>(&self, envelope: impl AsRef<str>) -> Result<T, VaultError>
    where
        T: DeserializeOwned,
    {
        self.inner.entropy.ensure_available()?;

        let blob =
            Envelope::decode(envelope.as_ref()).ok_or_else(|| rejected("invalid base64"))?;
        let parts = Self::split(&blob)?;

        let key = self.current_key().await?;
        let plaintext = Self::open(key.cipher(), &parts)?;

        serde_json::from_slice(&plaintext).map_err(|_| rejected("plaintext is not the expected JSON"))
    }

    /// Derives (or confirms the cached) key for the current session ahead of time.
    ///
    /// # Errors
    /// Same as [`SessionVault::encrypt`], minus encoding failures.
    pub async fn derive_key(&self) -> Result<(), VaultError> {
        self.inner.entropy.ensure_available()?;
        self.current_key().await.map(drop)
    }

    /// Drops the cached key. Persisted seed and salt stay, so earlier envelopes remain
    /// decryptable and the key is re-derived on the next call.
    pub fn clear_key(&self) {
        let dropped = self.inner.keys.clear();
        info!(dropped, "Session key cleared");
    }

    /// Ends the session: drops the cached key and removes the seed and salt from storage.
    ///
    /// Envelopes from the ended session can no longer be opened. The vault returns to
    /// [`SessionMode::Persistent`] and the next call starts a new session.
    ///
    /// # Errors
    /// * [`VaultError::Storage`] If a slot could not be removed.
    pub async fn end_session(&self) -> Result<(), VaultError> {
        self.inner.keys.clear();
        self.inner.seeds.discard().await.context("removing session seed")?;
        self.inner.salts.discard().await.context("removing session salt")?;
        self.inner.degraded.store(false, Ordering::Release);

        info!("Session ended");
        Ok(())
    }

    /// Reports whether any call so far had to run on ephemeral session values.
    #[must_use]
    pub fn mode(&self) -> SessionMode {
        if self.inner.degraded.load(Ordering::Acquire) {
            SessionMode::Degraded
        } else {
            SessionMode::Persistent
        }
    }

    /// The key cache owned by this vault.
    #[must_use]
    pub fn key_store(&self) -> &KeyStore {
        &self.inner.keys
    }

    /// The validated configuration this vault was built with.
    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.inner.config
    }

    async fn current_key(&self) -> Result<DerivedKey, VaultError> {
        let seed = self.inner.seeds.get_or_create().await?;
        let salt = self.inner.salts.get_or_create().await?;

        self.note(seed.persistence);
        self.note(salt.persistence);

        self.inner.keys.get_or_derive(&seed.value, &salt.value).await
    }

    fn note(&self, persistence: Persistence) {
        if persistence == Persistence::Ephemeral && !self.inner.degraded.swap(true, Ordering::AcqRel)
        {
            warn!("Session storage unavailable, vault is running in degraded mode");
        }
    }

    fn next_nonce(&self) -> Result<Nonce<Aes>, VaultError> {
        let mut nonce = Nonce::<Aes>::default();
        self.inner.entropy.fill(&mut nonce)?;
        Ok(nonce)
    }

    fn seal(cipher: &Aes, nonce: &Nonce<Aes>, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let mut buf = Vec::with_capacity(HEADER_LEN + NONCE_LEN + plaintext.len() + TAG_LEN);
        buf.push(ENVELOPE_VERSION_V1);
        buf.extend_from_slice(nonce);
        buf.extend_from_slice(plaintext);

        let (header, rest) = buf.split_at_mut(HEADER_LEN);
        let (_nonce_part, data_part) = rest.split_at_mut(NONCE_LEN);
        let in_out = InOutBuf::from(data_part);

        // The version byte is authenticated, so a rewritten header fails the tag check.
        let tag = cipher.encrypt_inout_detached(nonce, header, in_out).map_err(|_| {
            VaultError::Encryption {
                message: "Encryption failed".into(),
                context: Some("AEAD encryption failed".into()),
            }
        })?;

        buf.extend_from_slice(tag.as_slice());
        Ok(buf)
    }

    fn split(blob: &[u8]) -> Result<Parts<'_>, VaultError> {
        if blob.len() < HEADER_LEN + NONCE_LEN + TAG_LEN {
            return Err(rejected("envelope too short"));
        }

        let (header, rest) = blob.split_at(HEADER_LEN);
        if header[0] != ENVELOPE_VERSION_V1 {
            return Err(rejected("unsupported envelope version"));
        }

        let (nonce, rest) = rest.split_at(NONCE_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

        Ok(Parts { header, nonce, ciphertext, tag })
    }

    fn open(cipher: &Aes, parts: &Parts<'_>) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let nonce = parts.nonce.try_into().map_err(|_| rejected("invalid nonce length"))?;
        let tag = parts.tag.try_into().map_err(|_| rejected("invalid tag length"))?;

        let mut buf = Zeroizing::new(parts.ciphertext.to_vec());
        let in_out = InOutBuf::from(&mut buf[..]);

        cipher
            .decrypt_inout_detached(&nonce, parts.header, in_out, &tag)
            .map_err(|_| rejected("authentication failed"))?;

        Ok(buf)
    }
}

/// Logs why an envelope was refused and returns the uniform error.
fn rejected(reason: &'static str) -> VaultError {
    debug!(reason, "Envelope rejected");
    VaultError::Decryption
}
