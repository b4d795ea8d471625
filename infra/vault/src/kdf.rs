//! Session key derivation and the in-memory key cache.

use crate::error::{VaultError, VaultErrorExt};
use crate::salt::SessionSalt;
use crate::seed::SessionSeed;
use crate::types::Aes;
use aead::{Key, KeyInit};
use parking_lot::Mutex;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, trace};
use zeroize::Zeroizing;

/// An initialized AES-256-GCM cipher for the current session.
///
/// The raw key bytes are wiped right after the cipher is keyed and are never exposed.
#[derive(Clone)]
pub struct DerivedKey {
    cipher: Arc<Aes>,
}

impl DerivedKey {
    pub(crate) fn cipher(&self) -> &Aes {
        &self.cipher
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Derives the session key with PBKDF2-HMAC-SHA256.
///
/// Deterministic in `(seed, salt, iterations)`. CPU-bound; async callers should go through
/// [`KeyStore::get_or_derive`], which runs it on the blocking pool.
///
/// # Errors
/// Returns [`VaultError::Internal`] if the derived material cannot key the cipher.
pub fn derive(
    seed: &SessionSeed,
    salt: &SessionSalt,
    iterations: u32,
) -> Result<DerivedKey, VaultError> {
    let mut raw = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(seed.as_str().as_bytes(), salt.as_bytes(), iterations, &mut raw[..]);

    let key = Key::<Aes>::try_from(&raw[..])
        .map_err(|_| VaultError::from(format!("Invalid key length {}", raw.len())))
        .context("session key")?;

    Ok(DerivedKey { cipher: Arc::new(Aes::new(&key)) })
}

#[derive(Debug)]
struct KeySlot {
    seed: SessionSeed,
    salt: SessionSalt,
    key: OnceCell<DerivedKey>,
}

/// Single-entry cache of the derived session key, keyed by `(seed, salt)`.
///
/// Concurrent misses for the same pair share one in-flight derivation. A failed derivation
/// leaves the entry empty and the next caller retries. Another pair replaces the entry.
#[derive(Debug)]
pub struct KeyStore {
    iterations: u32,
    slot: Mutex<Option<Arc<KeySlot>>>,
    derivations: AtomicU64,
}

impl KeyStore {
    #[must_use]
    pub fn new(iterations: u32) -> Self {
        Self { iterations, slot: Mutex::new(None), derivations: AtomicU64::new(0) }
    }

    /// Returns the key for `(seed, salt)`, deriving it on a miss.
    ///
    /// # Errors
    /// * [`VaultError::Internal`] If the derivation task panicked or was cancelled.
    pub async fn get_or_derive(
        &self,
        seed: &SessionSeed,
        salt: &SessionSalt,
    ) -> Result<DerivedKey, VaultError> {
        let slot = self.slot_for(seed, salt);

        if let Some(key) = slot.key.get() {
            trace!("Session key cache hit");
            return Ok(key.clone());
        }

        let key = slot
            .key
            .get_or_try_init(|| self.derive_blocking(slot.seed.clone(), slot.salt))
            .await?;

        Ok(key.clone())
    }

    /// Drops the cached key. Returns `true` if a derived key was held.
    pub fn clear(&self) -> bool {
        self.slot.lock().take().is_some_and(|slot| slot.key.initialized())
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(|slot| slot.key.initialized())
    }

    /// Number of completed PBKDF2 runs since this store was created.
    #[must_use]
    pub fn derivations(&self) -> u64 {
        self.derivations.load(Ordering::Acquire)
    }

    fn slot_for(&self, seed: &SessionSeed, salt: &SessionSalt) -> Arc<KeySlot> {
        let mut guard = self.slot.lock();
        match guard.as_ref() {
            Some(slot) if slot.seed == *seed && slot.salt == *salt => Arc::clone(slot),
            _ => {
                let slot = Arc::new(KeySlot {
                    seed: seed.clone(),
                    salt: *salt,
                    key: OnceCell::new(),
                });
                *guard = Some(Arc::clone(&slot));
                slot
            },
        }
    }

    async fn derive_blocking(
        &self,
        seed: SessionSeed,
        salt: SessionSalt,
    ) -> Result<DerivedKey, VaultError> {
        let iterations = self.iterations;
        let started = Instant::now();

        let key = tokio::task::spawn_blocking(move || derive(&seed, &salt, iterations))
            .await
            .map_err(|e| VaultError::from(e.to_string()))
            .context("key derivation task")??;

        self.derivations.fetch_add(1, Ordering::AcqRel);
        debug!(
            iterations,
            elapsed_ms = started.elapsed().as_millis(),
            "Session key derived"
        );
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_ITERATIONS;
    use crate::entropy::OsEntropy;
    use aead::AeadInOut;
    use aead::inout::InOutBuf;

    fn tag_for(key: &DerivedKey) -> Vec<u8> {
        let nonce = [7u8; 12].into();
        let mut data = *b"fixed plaintext";
        key.cipher()
            .encrypt_inout_detached(&nonce, b"", InOutBuf::from(&mut data[..]))
            .unwrap()
            .to_vec()
    }

    fn pair() -> (SessionSeed, SessionSalt) {
        (SessionSeed::generate(&OsEntropy).unwrap(), SessionSalt::generate(&OsEntropy).unwrap())
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let (seed, salt) = pair();
        let other = SessionSalt::generate(&OsEntropy).unwrap();

        let a = derive(&seed, &salt, MIN_ITERATIONS).unwrap();
        let b = derive(&seed, &salt, MIN_ITERATIONS).unwrap();
        let c = derive(&seed, &other, MIN_ITERATIONS).unwrap();

        assert_eq!(tag_for(&a), tag_for(&b));
        assert_ne!(tag_for(&a), tag_for(&c));
        assert_eq!(format!("{a:?}"), "DerivedKey(<redacted>)");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_derivation() {
        let store = KeyStore::new(MIN_ITERATIONS);
        let (seed, salt) = pair();

        let first = store.get_or_derive(&seed, &salt).await.unwrap();
        let second = store.get_or_derive(&seed, &salt).await.unwrap();

        assert_eq!(store.derivations(), 1);
        assert!(store.is_cached());
        assert_eq!(tag_for(&first), tag_for(&second));
    }

    #[tokio::test]
    async fn test_new_pair_replaces_entry() {
        let store = KeyStore::new(MIN_ITERATIONS);
        let (seed, salt) = pair();
        let (other_seed, other_salt) = pair();

        store.get_or_derive(&seed, &salt).await.unwrap();
        store.get_or_derive(&other_seed, &other_salt).await.unwrap();
        store.get_or_derive(&seed, &salt).await.unwrap();

        assert_eq!(store.derivations(), 3);
    }

    #[tokio::test]
    async fn test_clear_forces_rederivation() {
        let store = KeyStore::new(MIN_ITERATIONS);
        let (seed, salt) = pair();

        assert!(!store.clear());
        store.get_or_derive(&seed, &salt).await.unwrap();
        assert!(store.clear());
        assert!(!store.is_cached());

        store.get_or_derive(&seed, &salt).await.unwrap();
        assert_eq!(store.derivations(), 2);
    }
}
