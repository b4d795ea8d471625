//! # tabseal CLI
//!
//! Drives a [`SessionVault`](tabseal_vault::SessionVault) over a directory-backed session.
//! The session directory plays the role of a browser tab's transient storage: the seed and
//! salt live there until `tabseal end` removes them.
//!
//! ## Example
//! ```no_run
//! use tabseal_cli::{Command, Session, load_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(None)?;
//!     let session = Session::open(&config.session_dir, config.vault).await?;
//!
//!     let envelope = session.execute(&Command::Seal { json: Some("[1,2,3]".into()) }).await?;
//!     let json = session.execute(&Command::Open { envelope, compact: true }).await?;
//!     assert_eq!(json, "[1,2,3]");
//!     Ok(())
//! }
//! ```

mod cli;
mod config;
mod session;

pub use cli::{Cli, Command};
pub use config::{CliConfig, ConfigError, load_config};
pub use session::Session;
