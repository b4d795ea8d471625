use crate::entropy::{EntropySource, random_array};
use crate::error::VaultError;
use crate::types::Provisioned;
use std::fmt;
use std::sync::Arc;
use tabseal_storage::{SessionStorage, StorageError};
use tracing::{debug, warn};

/// Opaque per-session identifier, used as key derivation input.
///
/// Format: `{unix millis as hex}-{16 random bytes as hex}`. Stored values are accepted as-is.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionSeed(String);

impl SessionSeed {
    /// Generates a fresh seed from the current time and 16 random bytes.
    ///
    /// # Errors
    /// Returns [`VaultError::CryptoUnavailable`] if the entropy source fails.
    pub fn generate(entropy: &dyn EntropySource) -> Result<Self, VaultError> {
        let random = random_array::<16>(entropy)?;
        let millis = chrono::Utc::now().timestamp_millis();
        Ok(Self(format!("{millis:x}-{}", hex::encode(random))))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionSeed").field(&"<redacted>").finish()
    }
}

/// Reads or creates the session seed in its storage slot.
#[derive(Debug, Clone)]
pub(crate) struct SeedProvider<S: SessionStorage> {
    storage: S,
    slot: String,
    entropy: Arc<dyn EntropySource>,
}

impl<S: SessionStorage> SeedProvider<S> {
    pub(crate) fn new(storage: S, slot: String, entropy: Arc<dyn EntropySource>) -> Self {
        Self { storage, slot, entropy }
    }

    /// Returns the persisted seed, creating it on first use.
    ///
    /// Storage failures never surface: the caller gets a fresh seed tagged as ephemeral.
    pub(crate) async fn get_or_create(&self) -> Result<Provisioned<SessionSeed>, VaultError> {
        match self.storage.get(&self.slot).await {
            Ok(Some(stored)) if !stored.is_empty() => {
                return Ok(Provisioned::persisted(SessionSeed(stored)));
            },
            Ok(Some(empty)) => {
                if let Err(e) = self.storage.remove_if(&self.slot, &empty).await {
                    return self.ephemeral(&e);
                }
            },
            Ok(None) => {},
            Err(e) => return self.ephemeral(&e),
        }

        let candidate = SessionSeed::generate(self.entropy.as_ref())?;
        match self.storage.put_if_absent(&self.slot, candidate.as_str()).await {
            Ok(winner) => {
                debug!(slot = %self.slot, created = (winner == candidate.0), "session seed ready");
                Ok(Provisioned::persisted(SessionSeed(winner)))
            },
            Err(e) => {
                warn!(slot = %self.slot, error = %e, "failed to persist session seed");
                Ok(Provisioned::ephemeral(candidate))
            },
        }
    }

    pub(crate) async fn discard(&self) -> Result<(), StorageError> {
        self.storage.remove(&self.slot).await
    }

    fn ephemeral(&self, error: &StorageError) -> Result<Provisioned<SessionSeed>, VaultError> {
        warn!(slot = %self.slot, error = %error, "session seed unreadable, using ephemeral seed");
        Ok(Provisioned::ephemeral(SessionSeed::generate(self.entropy.as_ref())?))
    }
}
