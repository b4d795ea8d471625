pub mod fixtures;

use fixtures::{FailingEntropy, IntakeDraft, setup_vault, tamper};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tabseal_vault::prelude::*;
use tabseal_vault::{DEFAULT_SALT_SLOT, DEFAULT_SEED_SLOT};

#[tokio::test]
async fn object_roundtrip() {
    let (vault, _tab) = setup_vault();
    let value = json!({ "a": 1, "b": "x" });

    let envelope = vault.encrypt(&value).await.expect("encrypt failed");
    let restored: Value = vault.decrypt(&envelope).await.expect("decrypt failed");

    assert_eq!(value, restored);
}

#[tokio::test]
async fn empty_string_roundtrip() {
    let (vault, _tab) = setup_vault();

    let envelope = vault.encrypt("").await.expect("encrypt failed");
    let restored: String = vault.decrypt(&envelope).await.expect("decrypt failed");

    assert_eq!(restored, "");
}

#[tokio::test]
async fn array_roundtrip() {
    let (vault, _tab) = setup_vault();

    let envelope = vault.encrypt(&[1, 2, 3]).await.expect("encrypt failed");
    let restored: Vec<u8> = vault.decrypt(&envelope).await.expect("decrypt failed");

    assert_eq!(restored, [1, 2, 3]);
}

#[tokio::test]
async fn float_roundtrip_is_exact() {
    let (vault, _tab) = setup_vault();
    let score = 1.071_566_039_146_582_6e-75_f64;
    let value = json!({ "score": score, "weights": [0.1, -1.5e308, f64::MIN_POSITIVE] });

    let envelope = vault.encrypt(&value).await.expect("encrypt failed");
    let restored: Value = vault.decrypt(&envelope).await.expect("decrypt failed");

    assert_eq!(restored["score"].as_f64().map(f64::to_bits), Some(score.to_bits()));
    assert_eq!(value, restored);
}

#[tokio::test]
async fn typed_struct_roundtrip() {
    let (vault, _tab) = setup_vault();
    let draft = IntakeDraft::sample();

    let envelope = vault.encrypt(&draft).await.expect("encrypt failed");
    let restored: IntakeDraft = vault.decrypt(envelope.as_str()).await.expect("decrypt failed");

    assert_eq!(draft, restored);
}

#[tokio::test]
async fn corrupted_character_is_rejected() {
    let (vault, _tab) = setup_vault();
    let envelope = vault.encrypt(&json!({ "a": 1, "b": "x" })).await.unwrap();

    let corrupted = tamper(envelope.as_str(), envelope.as_str().len() / 2);
    let result = vault.decrypt::<Value>(corrupted).await;

    assert!(matches!(result, Err(VaultError::Decryption)));
}

#[tokio::test]
async fn cleared_session_slots_invalidate_old_envelopes() {
    let (vault, tab) = setup_vault();
    let envelope = vault.encrypt(&json!({ "a": 1, "b": "x" })).await.unwrap();

    tab.remove(DEFAULT_SEED_SLOT).await.unwrap();
    tab.remove(DEFAULT_SALT_SLOT).await.unwrap();
    vault.clear_key();

    let result = vault.decrypt::<Value>(&envelope).await;
    assert!(matches!(result, Err(VaultError::Decryption)));
}

#[tokio::test]
async fn identical_input_gives_distinct_envelopes() {
    let (vault, _tab) = setup_vault();

    let first = vault.encrypt("same").await.unwrap();
    let second = vault.encrypt("same").await.unwrap();

    assert_ne!(first, second);
    assert_eq!(vault.decrypt::<String>(&first).await.unwrap(), "same");
    assert_eq!(vault.decrypt::<String>(&second).await.unwrap(), "same");
}

#[tokio::test]
async fn clear_key_keeps_earlier_envelopes_readable() {
    let (vault, _tab) = setup_vault();
    let envelope = vault.encrypt(&IntakeDraft::sample()).await.unwrap();

    vault.clear_key();
    assert!(!vault.key_store().is_cached());

    let restored: IntakeDraft = vault.decrypt(&envelope).await.expect("decrypt after clear");
    assert_eq!(restored, IntakeDraft::sample());
    assert_eq!(vault.key_store().derivations(), 2);
}

#[tokio::test]
async fn key_is_derived_once_per_session() {
    let (vault, _tab) = setup_vault();

    let envelope = vault.encrypt(&1).await.unwrap();
    vault.derive_key().await.unwrap();
    vault.derive_key().await.unwrap();

    assert_eq!(vault.decrypt::<i32>(&envelope).await.unwrap(), 1);
    assert_eq!(vault.key_store().derivations(), 1);
    assert!(vault.key_store().is_cached());
}

#[tokio::test]
async fn vaults_over_same_tab_share_the_session() {
    let (vault, tab) = setup_vault();
    let other = SessionVault::builder().storage(tab).build().unwrap();

    let envelope = vault.encrypt("shared").await.unwrap();
    assert_eq!(other.decrypt::<String>(&envelope).await.unwrap(), "shared");
}

#[tokio::test]
async fn separate_tabs_are_isolated() {
    let (vault, _tab) = setup_vault();
    let (other, _other_tab) = setup_vault();

    let envelope = vault.encrypt("private").await.unwrap();
    let result = other.decrypt::<String>(&envelope).await;

    assert!(matches!(result, Err(VaultError::Decryption)));
}

#[tokio::test]
async fn end_session_starts_a_new_session() {
    let (vault, tab) = setup_vault();
    let envelope = vault.encrypt("old").await.unwrap();

    vault.end_session().await.expect("end_session failed");
    assert!(tab.is_empty());

    let result = vault.decrypt::<String>(&envelope).await;
    assert!(matches!(result, Err(VaultError::Decryption)));

    let fresh = vault.encrypt("new").await.unwrap();
    assert_eq!(vault.decrypt::<String>(&fresh).await.unwrap(), "new");
}

#[tokio::test]
async fn end_session_surfaces_storage_errors() {
    let (vault, tab) = setup_vault();
    vault.derive_key().await.unwrap();

    tab.set_available(false);
    let result = vault.end_session().await;

    assert!(matches!(result, Err(VaultError::Storage { .. })));
}

#[tokio::test]
async fn unavailable_storage_degrades_instead_of_failing() {
    let (vault, tab) = setup_vault();
    tab.set_available(false);
    assert_eq!(vault.mode(), SessionMode::Persistent);

    let envelope = vault.encrypt(&IntakeDraft::sample()).await.expect("encrypt must not fail");
    assert_eq!(vault.mode(), SessionMode::Degraded);

    let result = vault.decrypt::<IntakeDraft>(&envelope).await;
    assert!(matches!(result, Err(VaultError::Decryption)));
    assert!(tab.is_empty());
}

#[tokio::test]
async fn quota_exhaustion_degrades() {
    let tab = MemoryStorage::with_quota(16);
    let vault = SessionVault::builder().storage(tab).build().unwrap();

    vault.encrypt("payload").await.expect("encrypt must not fail");
    assert_eq!(vault.mode(), SessionMode::Degraded);
}

#[tokio::test]
async fn missing_entropy_fails_before_storage() {
    let tab = MemoryStorage::new();
    let vault =
        SessionVault::builder().storage(tab.clone()).entropy(FailingEntropy).build().unwrap();

    let encrypted = vault.encrypt("secret").await;
    assert!(matches!(encrypted, Err(VaultError::CryptoUnavailable { .. })));

    let decrypted = vault.decrypt::<String>("AQ==").await;
    assert!(matches!(decrypted, Err(VaultError::CryptoUnavailable { .. })));

    assert!(tab.is_empty());
}

#[tokio::test]
async fn unserializable_value_is_an_encoding_error() {
    let (vault, tab) = setup_vault();
    let mut map = BTreeMap::new();
    map.insert((1, 2), "tuple keys are not valid JSON object keys");

    let result = vault.encrypt(&map).await;

    assert!(matches!(result, Err(VaultError::Encoding { .. })));
    assert!(tab.is_empty());
}

#[tokio::test]
async fn wrong_target_type_is_a_decryption_error() {
    let (vault, _tab) = setup_vault();
    let envelope = vault.encrypt("not a number").await.unwrap();

    let result = vault.decrypt::<u64>(&envelope).await;
    assert!(matches!(result, Err(VaultError::Decryption)));
}

#[tokio::test]
async fn malformed_envelopes_are_rejected_uniformly() {
    let (vault, _tab) = setup_vault();

    for input in ["", "not base64 at all", "AQID", "AgAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"] {
        let result = vault.decrypt::<Value>(input).await;
        assert!(matches!(result, Err(VaultError::Decryption)), "input {input:?}");
    }
}

#[tokio::test]
async fn custom_slots_are_used() {
    let tab = MemoryStorage::new();
    let config = VaultConfig {
        seed_slot: "intake.sid".to_owned(),
        salt_slot: "intake.salt".to_owned(),
        ..VaultConfig::default()
    };
    let vault = SessionVault::builder().storage(tab.clone()).config(config).build().unwrap();

    vault.derive_key().await.unwrap();

    assert!(tab.get("intake.sid").await.unwrap().is_some());
    assert!(tab.get("intake.salt").await.unwrap().is_some());
    assert!(tab.get(DEFAULT_SEED_SLOT).await.unwrap().is_none());
}
