use serde::{Deserialize, Serialize};
use tabseal_vault::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeDraft {
    pub step: u32,
    pub complaint: String,
    pub answers: Vec<String>,
}

impl IntakeDraft {
    #[must_use]
    pub fn sample() -> Self {
        Self {
            step: 3,
            complaint: "persistent cough".to_owned(),
            answers: vec!["two weeks".to_owned(), "no fever".to_owned()],
        }
    }
}

/// A random source that is never available.
#[derive(Debug, Default)]
pub struct FailingEntropy;

impl EntropySource for FailingEntropy {
    fn fill(&self, _dest: &mut [u8]) -> Result<(), VaultError> {
        Err(VaultError::CryptoUnavailable { message: "no random source".into(), context: None })
    }
}

/// Initializes a vault over a fresh in-memory "tab" and returns both.
/// # Panics
/// * If vault setup fails, the function will panic.
#[must_use]
pub fn setup_vault() -> (SessionVault<MemoryStorage>, MemoryStorage) {
    let tab = MemoryStorage::new();
    let vault = SessionVault::builder().storage(tab.clone()).build().expect("Vault setup failed");
    (vault, tab)
}

/// Replaces the character at `index` with a different base64 character.
#[must_use]
pub fn tamper(envelope: &str, index: usize) -> String {
    envelope
        .char_indices()
        .map(|(i, c)| if i == index { if c == 'A' { 'B' } else { 'A' } } else { c })
        .collect()
}
