use crate::entropy::{EntropySource, random_array};
use crate::error::VaultError;
use crate::types::{Provisioned, SALT_LEN};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tabseal_storage::{SessionStorage, StorageError};
use tracing::{debug, warn};

/// 128-bit key derivation salt, paired 1:1 with a session seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionSalt([u8; SALT_LEN]);

impl SessionSalt {
    /// Generates a fresh random salt.
    ///
    /// # Errors
    /// Returns [`VaultError::CryptoUnavailable`] if the entropy source fails.
    pub fn generate(entropy: &dyn EntropySource) -> Result<Self, VaultError> {
        Ok(Self(random_array(entropy)?))
    }

    /// Builds the salt used when storage cannot hold one.
    ///
    /// SHA-256 over the current time and 8 random bytes, truncated to 16 bytes. Only 64 bits
    /// are unpredictable, which is weaker than [`SessionSalt::generate`]; it is never persisted.
    ///
    /// # Errors
    /// Returns [`VaultError::CryptoUnavailable`] if the entropy source fails.
    pub fn weak_fallback(entropy: &dyn EntropySource) -> Result<Self, VaultError> {
        let random = random_array::<8>(entropy)?;
        let millis = chrono::Utc::now().timestamp_millis();

        let mut hasher = Sha256::new();
        hasher.update(millis.to_be_bytes());
        hasher.update(random);
        let digest = hasher.finalize();

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&digest[..SALT_LEN]);
        Ok(Self(salt))
    }

    /// Parses the stored representation. Anything but exactly 16 bytes of base64 is rejected.
    #[must_use]
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let bytes = STANDARD.decode(encoded.trim()).ok()?;
        bytes.try_into().ok().map(Self)
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

/// Reads or creates the session salt in its storage slot.
#[derive(Debug, Clone)]
pub(crate) struct SaltProvider<S: SessionStorage> {
    storage: S,
    slot: String,
    entropy: Arc<dyn EntropySource>,
}

impl<S: SessionStorage> SaltProvider<S> {
    pub(crate) fn new(storage: S, slot: String, entropy: Arc<dyn EntropySource>) -> Self {
        Self { storage, slot, entropy }
    }

    /// Returns the persisted salt, creating or repairing it as needed.
    ///
    /// A stored value that is not a valid salt is removed and replaced; concurrent repairs
    /// converge on the first replacement written. If storage fails at any step the caller gets
    /// a [`SessionSalt::weak_fallback`] tagged as ephemeral.
    pub(crate) async fn get_or_create(&self) -> Result<Provisioned<SessionSalt>, VaultError> {
        match self.storage.get(&self.slot).await {
            Ok(Some(stored)) => {
                if let Some(salt) = SessionSalt::from_base64(&stored) {
                    return Ok(Provisioned::persisted(salt));
                }

                warn!(slot = %self.slot, "stored session salt is corrupt, replacing it");
                if let Err(e) = self.storage.remove_if(&self.slot, &stored).await {
                    return self.fallback(&e);
                }
            },
            Ok(None) => {},
            Err(e) => return self.fallback(&e),
        }

        let candidate = SessionSalt::generate(self.entropy.as_ref())?;
        match self.storage.put_if_absent(&self.slot, &candidate.to_base64()).await {
            Ok(winner) => match SessionSalt::from_base64(&winner) {
                Some(salt) => {
                    debug!(slot = %self.slot, created = (salt == candidate), "session salt ready");
                    Ok(Provisioned::persisted(salt))
                },
                None => {
                    warn!(slot = %self.slot, "concurrent writer stored a corrupt session salt");
                    Ok(Provisioned::ephemeral(SessionSalt::weak_fallback(self.entropy.as_ref())?))
                },
            },
            Err(e) => self.fallback(&e),
        }
    }

    pub(crate) async fn discard(&self) -> Result<(), StorageError> {
        self.storage.remove(&self.slot).await
    }

    fn fallback(&self, error: &StorageError) -> Result<Provisioned<SessionSalt>, VaultError> {
        warn!(slot = %self.slot, error = %error, "session salt unavailable, using weak fallback");
        Ok(Provisioned::ephemeral(SessionSalt::weak_fallback(self.entropy.as_ref())?))
    }
}
