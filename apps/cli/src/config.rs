use config::{Config, Environment, File};
use serde::Deserialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tabseal_vault::VaultConfig;
use tracing::debug;

/// Errors raised while assembling the CLI configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Settings for the `tabseal` binary.
///
/// Every field has a default, so an empty file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Directory holding the session slots.
    pub session_dir: PathBuf,
    /// Base log level, raised by `-v`.
    pub log_level: String,
    /// `compact` or `json`.
    pub log_format: String,
    /// Directory for rolling log files. Unset means stderr only.
    pub log_dir: Option<PathBuf>,
    /// `minutely`, `hourly`, `daily` or `never`.
    pub log_rotation: String,
    /// Rotated files kept in `log_dir`.
    pub log_max_files: usize,
    pub vault: VaultConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            session_dir: std::env::temp_dir().join("tabseal-session"),
            log_level: "warn".to_owned(),
            log_format: "compact".to_owned(),
            log_dir: None,
            log_rotation: "daily".to_owned(),
            log_max_files: 5,
            vault: VaultConfig::default(),
        }
    }
}

/// Loads the CLI configuration in layers.
///
/// 1. **Defaults** from [`CliConfig::default`].
/// 2. **File**: the given TOML file, if any. A path that was asked for must exist.
/// 3. **Environment**: variables prefixed with `TABSEAL__`, nested with double underscores
///    (e.g. `TABSEAL__VAULT__ITERATIONS=200000` maps to `vault.iterations`).
///
/// # Errors
/// Returns [`ConfigError::Config`] if the file is missing or malformed, or if a value does not
/// fit its field.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        debug!(path = %path.display(), "Loading config file");
        builder = builder.add_source(File::from(path).required(true));
    }

    builder
        .add_source(
            Environment::with_prefix("TABSEAL")
                .separator("__")
                .convert_case(config::Case::Snake)
                .try_parsing(true),
        )
        .build()
        .map_err(|source| ConfigError::Config {
            source,
            context: Some("Failed to build config".into()),
        })?
        .try_deserialize::<CliConfig>()
        .map_err(|source| ConfigError::Config {
            source,
            context: Some("Failed to deserialize config".into()),
        })
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
