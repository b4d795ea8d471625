use crate::error::VaultError;
use serde::{Deserialize, Serialize};

/// Storage slot holding the session seed.
pub const DEFAULT_SEED_SLOT: &str = "tabseal.session_id";
/// Storage slot holding the base64-encoded session salt.
pub const DEFAULT_SALT_SLOT: &str = "tabseal.session_salt";
/// Lower bound for PBKDF2-HMAC-SHA256 iterations.
pub const MIN_ITERATIONS: u32 = 100_000;

/// Vault settings.
///
/// Changing `iterations` or a slot name between two vaults over the same storage makes the
/// second unable to open envelopes written by the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub seed_slot: String,
    pub salt_slot: String,
    pub iterations: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            seed_slot: DEFAULT_SEED_SLOT.to_owned(),
            salt_slot: DEFAULT_SALT_SLOT.to_owned(),
            iterations: MIN_ITERATIONS,
        }
    }
}

impl VaultConfig {
    /// Checks the settings before a vault is built.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidConfiguration`] if the iteration count is below
    /// [`MIN_ITERATIONS`], or a slot name is blank, or both slots share a name.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.iterations < MIN_ITERATIONS {
            return Err(VaultError::InvalidConfiguration {
                message: format!(
                    "iterations must be at least {MIN_ITERATIONS}, got {}",
                    self.iterations
                )
                .into(),
                context: None,
            });
        }

        if self.seed_slot.trim().is_empty() || self.salt_slot.trim().is_empty() {
            return Err(VaultError::InvalidConfiguration {
                message: "storage slot names cannot be empty".into(),
                context: None,
            });
        }

        if self.seed_slot == self.salt_slot {
            return Err(VaultError::InvalidConfiguration {
                message: "seed and salt must use distinct storage slots".into(),
                context: Some(self.seed_slot.clone().into()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = VaultConfig::default();
        assert_eq!(config.iterations, 100_000);
        assert_eq!(config.seed_slot, DEFAULT_SEED_SLOT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_weak_iteration_count_rejected() {
        let config = VaultConfig { iterations: 10_000, ..VaultConfig::default() };
        assert!(matches!(config.validate(), Err(VaultError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_shared_slot_rejected() {
        let config = VaultConfig { salt_slot: DEFAULT_SEED_SLOT.to_owned(), ..Default::default() };
        assert!(config.validate().is_err());

        let config = VaultConfig { seed_slot: "  ".to_owned(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: VaultConfig = serde_json::from_str(r#"{ "iterations": 250000 }"#).unwrap();
        assert_eq!(config.iterations, 250_000);
        assert_eq!(config.salt_slot, DEFAULT_SALT_SLOT);
    }
}
