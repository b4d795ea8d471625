use crate::config::VaultConfig;
use crate::engine::{SessionVault, VaultInner};
use crate::entropy::{EntropySource, OsEntropy};
use crate::error::VaultError;
use crate::kdf::KeyStore;
use crate::salt::SaltProvider;
use crate::seed::SeedProvider;
use private::Sealed;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tabseal_storage::SessionStorage;
use tracing::debug;

#[derive(Debug, Default)]
pub struct NoStorage;
#[derive(Debug)]
pub struct WithStorage<S>(S);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoStorage {}
impl<S> Sealed for WithStorage<S> {}

/// A builder for the [`SessionVault`].
///
/// Storage is mandatory and enforced at compile time; configuration and the entropy source
/// default to [`VaultConfig::default`] and [`OsEntropy`].
#[allow(private_bounds)]
#[derive(Debug)]
pub struct VaultBuilder<S: SessionStorage, St: Sealed = NoStorage> {
    _storage: PhantomData<fn() -> S>,
    storage: St,
    config: VaultConfig,
    entropy: Option<Arc<dyn EntropySource>>,
}

impl<S: SessionStorage> Default for VaultBuilder<S> {
    fn default() -> Self {
        Self { _storage: PhantomData, storage: NoStorage, config: VaultConfig::default(), entropy: None }
    }
}

impl<S: SessionStorage> VaultBuilder<S> {
    #[must_use = "Builder must be given a storage with `storage` before use"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session storage holding the seed and salt slots.
    #[must_use]
    pub fn storage(self, storage: S) -> VaultBuilder<S, WithStorage<S>> {
        VaultBuilder {
            _storage: PhantomData,
            storage: WithStorage(storage),
            config: self.config,
            entropy: self.entropy,
        }
    }
}

#[allow(private_bounds)]
impl<S: SessionStorage, St: Sealed> VaultBuilder<S, St> {
    /// Replaces the whole configuration. Validated by `build`.
    #[must_use]
    pub fn config(mut self, config: VaultConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the PBKDF2 iteration count. Validated by `build`.
    #[must_use]
    pub const fn iterations(mut self, iterations: u32) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Replaces the random source used for seeds, salts and nonces.
    #[must_use]
    pub fn entropy(mut self, entropy: impl EntropySource) -> Self {
        self.entropy = Some(Arc::new(entropy));
        self
    }
}

impl<S: SessionStorage> VaultBuilder<S, WithStorage<S>> {
    /// Finalizes vault construction.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidConfiguration`] if the configuration does not validate.
    pub fn build(self) -> Result<SessionVault<S>, VaultError> {
        self.config.validate()?;

        let WithStorage(storage) = self.storage;
        let entropy = self.entropy.unwrap_or_else(|| Arc::new(OsEntropy));
        let config = self.config;

        let inner = VaultInner {
            seeds: SeedProvider::new(storage.clone(), config.seed_slot.clone(), Arc::clone(&entropy)),
            salts: SaltProvider::new(storage, config.salt_slot.clone(), Arc::clone(&entropy)),
            keys: KeyStore::new(config.iterations),
            degraded: AtomicBool::new(false),
            entropy,
            config,
        };

        debug!(
            seed_slot = %inner.config.seed_slot,
            salt_slot = %inner.config.salt_slot,
            iterations = inner.config.iterations,
            "Session vault ready"
        );

        Ok(SessionVault { inner: Arc::new(inner) })
    }
}
