use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tabseal_storage::{DirStorage, SessionStorage};
use tabseal_vault::{SessionMode, SessionVault, VaultConfig};
use tokio::io::AsyncReadExt;
use tracing::warn;

use crate::cli::Command;

/// A vault bound to one session directory.
#[derive(Debug)]
pub struct Session {
    storage: DirStorage,
    vault: SessionVault<DirStorage>,
}

impl Session {
    /// Opens (creating if needed) the session directory and builds the vault over it.
    ///
    /// # Errors
    /// Fails if the directory cannot be opened or the vault configuration is invalid.
    pub async fn open(dir: &Path, config: VaultConfig) -> Result<Self> {
        let storage = DirStorage::builder()
            .root(dir)
            .connect()
            .await
            .with_context(|| format!("Failed to open session directory {}", dir.display()))?;

        let vault = SessionVault::builder()
            .storage(storage.clone())
            .config(config)
            .build()
            .context("Invalid vault configuration")?;

        Ok(Self { storage, vault })
    }

    #[must_use]
    pub const fn vault(&self) -> &SessionVault<DirStorage> {
        &self.vault
    }

    /// Runs one command and returns what should be printed on stdout.
    ///
    /// # Errors
    /// Propagates input, vault and storage failures with context.
    pub async fn execute(&self, command: &Command) -> Result<String> {
        match command {
            Command::Seal { json } => {
                let input = match json {
                    Some(json) => json.clone(),
                    None => read_stdin().await?,
                };
                self.seal(&input).await
            },
            Command::Open { envelope, compact } => self.open_envelope(envelope, *compact).await,
            Command::Status => self.status().await,
            Command::End => {
                self.vault.end_session().await.context("Failed to end session")?;
                Ok("session ended".to_owned())
            },
        }
    }

    async fn seal(&self, input: &str) -> Result<String> {
        let value: Value = serde_json::from_str(input).context("Input is not valid JSON")?;
        let envelope = self.vault.encrypt(&value).await.context("Failed to seal payload")?;

        if self.vault.mode() == SessionMode::Degraded {
            warn!("Session storage is unavailable; this envelope will not open in a later run");
        }

        Ok(envelope.into_string())
    }

    async fn open_envelope(&self, envelope: &str, compact: bool) -> Result<String> {
        let value: Value = self.vault.decrypt(envelope).await.context("Failed to open envelope")?;

        let rendered =
            if compact { serde_json::to_string(&value) } else { serde_json::to_string_pretty(&value) };
        rendered.context("Failed to render JSON")
    }

    async fn status(&self) -> Result<String> {
        let config = self.vault.config();
        let seed = self.storage.get(&config.seed_slot).await.context("Failed to read seed slot")?;
        let salt = self.storage.get(&config.salt_slot).await.context("Failed to read salt slot")?;

        Ok(format!(
            "session_dir: {}\nseed: {}\nsalt: {}\niterations: {}",
            self.storage.root().display(),
            presence(seed.as_ref()),
            presence(salt.as_ref()),
            config.iterations,
        ))
    }
}

fn presence(slot: Option<&String>) -> &'static str {
    if slot.is_some() { "present" } else { "absent" }
}

async fn read_stdin() -> Result<String> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await.context("Failed to read stdin")?;
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_seal_then_open() {
        let dir = tempdir().unwrap();
        let session = Session::open(dir.path(), VaultConfig::default()).await.unwrap();

        let envelope = session
            .execute(&Command::Seal { json: Some(r#"{"a":1,"b":"x"}"#.to_owned()) })
            .await
            .unwrap();
        let opened = session
            .execute(&Command::Open { envelope, compact: true })
            .await
            .unwrap();

        assert_eq!(opened, r#"{"a":1,"b":"x"}"#);
    }

    #[tokio::test]
    async fn test_status_reflects_session() {
        let dir = tempdir().unwrap();
        let session = Session::open(dir.path(), VaultConfig::default()).await.unwrap();

        let before = session.execute(&Command::Status).await.unwrap();
        assert!(before.contains("seed: absent"));

        session.vault().derive_key().await.unwrap();
        let after = session.execute(&Command::Status).await.unwrap();
        assert!(after.contains("seed: present"));
        assert!(after.contains("salt: present"));

        session.execute(&Command::End).await.unwrap();
        let ended = session.execute(&Command::Status).await.unwrap();
        assert!(ended.contains("salt: absent"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_rejected() {
        let dir = tempdir().unwrap();
        let session = Session::open(dir.path(), VaultConfig::default()).await.unwrap();

        let result = session.execute(&Command::Seal { json: Some("{not json".to_owned()) }).await;
        assert!(result.is_err());
    }
}
