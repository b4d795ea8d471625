use crate::error::VaultError;
use std::fmt::Debug;

/// Cryptographically secure random source used for seeds, salts and nonces.
///
/// The vault asks the source for bytes before touching storage; a source that cannot deliver
/// makes every operation fail with [`VaultError::CryptoUnavailable`].
pub trait EntropySource: Debug + Send + Sync + 'static {
    /// Fills `dest` entirely with random bytes.
    ///
    /// # Errors
    /// Returns [`VaultError::CryptoUnavailable`] if no randomness can be produced.
    fn fill(&self, dest: &mut [u8]) -> Result<(), VaultError>;

    /// Checks that the source can currently produce randomness.
    ///
    /// # Errors
    /// Same as [`EntropySource::fill`].
    fn ensure_available(&self) -> Result<(), VaultError> {
        let mut probe = [0u8; 1];
        self.fill(&mut probe)
    }
}

/// The operating system's random source (via `getrandom`).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), VaultError> {
        getrandom::fill(dest).map_err(|e| VaultError::CryptoUnavailable {
            message: e.to_string().into(),
            context: Some("OS random source".into()),
        })
    }
}

pub(crate) fn random_array<const N: usize>(
    entropy: &dyn EntropySource,
) -> Result<[u8; N], VaultError> {
    let mut bytes = [0u8; N];
    entropy.fill(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_entropy_produces_distinct_values() {
        let a = random_array::<16>(&OsEntropy).unwrap();
        let b = random_array::<16>(&OsEntropy).unwrap();

        assert_ne!(a, b);
        assert!(OsEntropy.ensure_available().is_ok());
    }
}
