use crate::dir::{DirInner, DirStorage};
use crate::error::StorageErrorExt;
use crate::error::StorageError;
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::fs;
use tracing::info;

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug)]
pub struct DirStorageBuilder<S: Sealed = NoRoot> {
    state: S,
    create: bool,
}

impl Default for DirStorageBuilder {
    fn default() -> Self {
        Self { state: NoRoot, create: true }
    }
}

#[allow(private_bounds)]
impl<S: Sealed> DirStorageBuilder<S> {
    #[must_use = "Sets whether the session directory should be created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.create = enable;
        self
    }
}

impl DirStorageBuilder<NoRoot> {
    #[must_use = "Creates a new session storage builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the session directory"]
    pub fn root(self, path: impl Into<PathBuf>) -> DirStorageBuilder<WithRoot> {
        DirStorageBuilder { state: WithRoot(path.into()), create: self.create }
    }
}

impl DirStorageBuilder<WithRoot> {
    /// Opens the session directory.
    ///
    /// Boot sequence:
    /// 1. Creates the directory if `create(true)` was set (the default).
    /// 2. Canonicalizes it so slot paths are stable.
    /// 3. Removes stale temporary files left by crashed writers.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory does not exist and `create` is false,
    /// or if it cannot be created or resolved.
    pub async fn connect(self) -> Result<DirStorage, StorageError> {
        let root = &self.state.0;

        if self.create {
            fs::create_dir_all(root)
                .await
                .context(format!("Failed to bootstrap session directory: {}", root.display()))?;
            info!(path = %root.display(), "Bootstrapped session directory");
        }

        let canonical = fs::canonicalize(root)
            .await
            .context(format!("Failed to resolve session directory: {}", root.display()))?;

        let storage = DirStorage {
            inner: Arc::new(DirInner { root: canonical, tmp_counter: AtomicU64::new(1) }),
        };

        storage.purge_tmp().await;

        Ok(storage)
    }
}
