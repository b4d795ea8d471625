//! In-process session storage, the equivalent of one browser tab's transient storage.

use crate::error::StorageError;
use crate::traits::SessionStorage;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

#[derive(Debug, Default)]
struct MemoryInner {
    entries: Mutex<FxHashMap<String, String>>,
    quota: Option<usize>,
    disabled: AtomicBool,
}

/// Shared in-memory [`SessionStorage`].
///
/// Clones observe the same entries, so a vault and a test (or a host application) can hold
/// handles to the same "tab". Two knobs simulate hostile hosts:
/// * a byte quota counted over keys and values ([`MemoryStorage::with_quota`]),
/// * an availability switch that makes every call fail ([`MemoryStorage::set_available`]).
///
/// # Example
///
/// ```rust
/// use tabseal_storage::{MemoryStorage, SessionStorage};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tabseal_storage::StorageError> {
/// let tab = MemoryStorage::new();
/// let winner = tab.put_if_absent("slot", "first").await?;
/// let loser = tab.put_if_absent("slot", "second").await?;
///
/// assert_eq!(winner, "first");
/// assert_eq!(loser, "first");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<MemoryInner>,
}

impl MemoryStorage {
    /// Creates an empty, unlimited, available storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage that rejects writes growing it beyond `bytes`.
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        Self { inner: Arc::new(MemoryInner { quota: Some(bytes), ..MemoryInner::default() }) }
    }

    /// Toggles the storage on or off. While off, every operation fails with
    /// [`StorageError::Unavailable`]; entries are kept.
    pub fn set_available(&self, available: bool) {
        self.inner.disabled.store(!available, Ordering::Release);
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.inner.disabled.load(Ordering::Acquire)
    }

    /// Number of stored slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StorageError::Unavailable { message: "storage is disabled".into(), context: None })
        }
    }

    fn check_quota(
        &self,
        entries: &FxHashMap<String, String>,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError> {
        let Some(quota) = self.inner.quota else {
            return Ok(());
        };

        let used: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        let needed = used + key.len() + value.len();

        if needed > quota {
            return Err(StorageError::QuotaExceeded {
                message: format!("{needed} bytes requested, quota is {quota}").into(),
                context: Some(key.to_owned().into()),
            });
        }
        Ok(())
    }
}

impl SessionStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.ensure_available()?;
        Ok(self.inner.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_available()?;
        let mut entries = self.inner.entries.lock();
        self.check_quota(&entries, key, value)?;
        entries.insert(key.to_owned(), value.to_owned());
        trace!(key, "Slot written");
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: &str) -> Result<String, StorageError> {
        self.ensure_available()?;
        let mut entries = self.inner.entries.lock();
        if let Some(existing) = entries.get(key) {
            return Ok(existing.clone());
        }
        self.check_quota(&entries, key, value)?;
        entries.insert(key.to_owned(), value.to_owned());
        trace!(key, "Slot created");
        Ok(value.to_owned())
    }

    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool, StorageError> {
        self.ensure_available()?;
        let mut entries = self.inner.entries.lock();
        if entries.get(key).is_some_and(|current| current == expected) {
            entries.remove(key);
            trace!(key, "Slot removed");
            return Ok(true);
        }
        Ok(false)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.inner.entries.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.inner.entries.lock().clear();
        Ok(())
    }
}
