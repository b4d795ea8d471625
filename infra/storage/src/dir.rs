//! Directory-backed session storage.
//!
//! Each slot is one file inside the session directory. Writes go through a unique temporary
//! file that is synced before it becomes visible, so readers never observe a half-written
//! slot. Tearing the session down removes the slot files.

use crate::builder::DirStorageBuilder;
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance;
use crate::security::{self, TMP_MARKER};
use crate::traits::SessionStorage;
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// The internal shared state of a [`DirStorage`] instance.
#[derive(Debug)]
pub struct DirInner {
    /// The canonicalized session directory.
    pub(crate) root: PathBuf,
    /// A unique counter used to generate temporary file names.
    pub(crate) tmp_counter: AtomicU64,
}

/// A [`SessionStorage`] living in a directory on disk.
///
/// This handle is internally reference-counted (`Arc`) and can be cheaply cloned
/// across threads or tasks.
///
/// # Example
///
/// ```rust
/// use tabseal_storage::{DirStorage, SessionStorage, StorageError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     # let root = tmp.path().join("session");
///     let session = DirStorage::builder().root(&root).create(true).connect().await?;
///
///     session.set("draft", "{\"step\":2}").await?;
///     assert_eq!(session.get("draft").await?.as_deref(), Some("{\"step\":2}"));
///
///     session.clear().await?;
///     assert!(session.get("draft").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DirStorage {
    pub(crate) inner: Arc<DirInner>,
}

impl Deref for DirStorage {
    type Target = DirInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DirStorage {
    #[must_use = "The storage is not initialized until you call .connect()"]
    pub fn builder() -> DirStorageBuilder {
        DirStorageBuilder::new()
    }

    /// The canonical session directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Resolves a slot name to its file path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key is empty, too long, hidden, or contains
    /// characters other than ASCII alphanumerics, `.`, `_` and `-`.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        security::resolve_key(&self.root, key)
    }

    /// Writes `data` to a fresh temporary file next to `target` and syncs it.
    async fn write_tmp(&self, target: &Path, data: &[u8]) -> Result<PathBuf, StorageError> {
        let temp = unique_tmp_path(target, &self.tmp_counter);

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp)
            .await
            .context(format!("Temp creation failed: {}", temp.display()))?;
        file.write_all(data).await.context("Write failed")?;
        file.sync_all().await.context("Hardware sync failed")?;

        Ok(temp)
    }

    async fn read_slot(path: &Path) -> Result<Option<String>, StorageError> {
        match fs::read(path).await {
            Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|_| StorageError::Corrupt {
                message: "slot is not valid UTF-8".into(),
                context: Some(path.display().to_string().into()),
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Read failed: {}", path.display()).into()),
            }),
        }
    }

    async fn discard(temp: &Path) {
        if let Err(err) = fs::remove_file(temp).await {
            tracing::warn!(path = %temp.display(), error = %err, "Temp file removal failed");
        }
    }

    async fn sync_dir(path: &Path) {
        match fs::File::open(path).await {
            Ok(dir) => {
                if let Err(err) = dir.sync_all().await {
                    tracing::warn!(path = %path.display(), error = %err, "Directory sync failed");
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Directory open failed");
            },
        }
    }

    pub(crate) async fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.root).await;
    }
}

impl SessionStorage for DirStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let resolved = self.resolve(key)?;
        Self::read_slot(&resolved).await
    }

    /// Atomic swap: unique temp file, `fsync`, rename over the target.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let resolved = self.resolve(key)?;
        let temp = self.write_tmp(&resolved, value.as_bytes()).await?;

        if let Err(err) = fs::rename(&temp, &resolved).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&resolved)
                    .await
                    .context(format!("Failed to replace existing slot: {}", resolved.display()))?;
                fs::rename(&temp, &resolved).await.context(format!(
                    "Atomic swap failed: {} -> {}",
                    temp.display(),
                    resolved.display()
                ))?;
            } else {
                Self::discard(&temp).await;
                return Err(StorageError::Io {
                    source: err,
                    context: Some(
                        format!("Atomic swap failed: {} -> {}", temp.display(), resolved.display())
                            .into(),
                    ),
                });
            }
        }

        Self::sync_dir(&self.root).await;
        debug!(key, "Slot saved atomically");
        Ok(())
    }

    /// Publishes a fully written temp file with a hard link, which fails if the slot exists.
    async fn put_if_absent(&self, key: &str, value: &str) -> Result<String, StorageError> {
        let resolved = self.resolve(key)?;

        if let Some(existing) = Self::read_slot(&resolved).await? {
            return Ok(existing);
        }

        let temp = self.write_tmp(&resolved, value.as_bytes()).await?;
        let linked = fs::hard_link(&temp, &resolved).await;
        Self::discard(&temp).await;

        match linked {
            Ok(()) => {
                Self::sync_dir(&self.root).await;
                debug!(key, "Slot created");
                Ok(value.to_owned())
            },
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(key, "Slot created concurrently, adopting the persisted value");
                Self::read_slot(&resolved).await?.ok_or_else(|| StorageError::Io {
                    source: ErrorKind::NotFound.into(),
                    context: Some(format!("Slot vanished after creation: {key}").into()),
                })
            },
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Failed to publish slot: {}", resolved.display()).into()),
            }),
        }
    }

    /// Claims the slot by renaming it to a private temp path, so at most one caller can take
    /// it. A claimed value that no longer matches is linked back unless a newer slot exists.
    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool, StorageError> {
        let resolved = self.resolve(key)?;

        if Self::read_slot(&resolved).await?.as_deref() != Some(expected) {
            return Ok(false);
        }

        let claimed = unique_tmp_path(&resolved, &self.tmp_counter);
        match fs::rename(&resolved, &claimed).await {
            Ok(()) => {},
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to claim slot: {}", resolved.display()).into()),
                });
            },
        }

        let matched = Self::read_slot(&claimed).await?.as_deref() == Some(expected);
        if !matched {
            match fs::hard_link(&claimed, &resolved).await {
                Ok(()) => debug!(key, "Slot changed while claimed, restored"),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {},
                Err(err) => {
                    Self::discard(&claimed).await;
                    let context = format!("Failed to restore slot: {}", resolved.display());
                    return Err(StorageError::Io { source: err, context: Some(context.into()) });
                },
            }
        }

        Self::discard(&claimed).await;
        Self::sync_dir(&self.root).await;
        if matched {
            debug!(key, "Slot removed");
        }
        Ok(matched)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let resolved = self.resolve(key)?;
        match fs::remove_file(&resolved).await {
            Ok(()) => {
                debug!(key, "Slot removed");
                Ok(())
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Failed to delete: {}", resolved.display()).into()),
            }),
        }
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .context(format!("Failed to list session: {}", self.root.display()))?;

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await.context("Failed to list session")? {
            if !entry.file_type().await.context("Failed to stat slot")?.is_file() {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {},
                Err(err) => {
                    return Err(StorageError::Io {
                        source: err,
                        context: Some(format!("Failed to delete: {}", path.display()).into()),
                    });
                },
            }
        }

        debug!(removed, root = %self.root.display(), "Session storage cleared");
        Ok(())
    }
}

fn unique_tmp_path(target: &Path, counter: &AtomicU64) -> PathBuf {
    let counter = counter.fetch_add(1, Ordering::Relaxed);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("slot");
    let tmp_name = format!("{file_name}{TMP_MARKER}{}.{counter}", std::process::id());
    target.with_file_name(tmp_name)
}
