use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Seal and open JSON payloads with a session-scoped key.
#[derive(Debug, Parser)]
#[command(name = "tabseal", version, about)]
pub struct Cli {
    /// Session directory (overrides the configured one).
    #[arg(long, global = true, value_name = "DIR")]
    pub session_dir: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More log output on stderr; repeat for more detail.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Encrypt a JSON value and print the envelope.
    Seal {
        /// JSON to encrypt. Read from stdin when omitted.
        json: Option<String>,
    },
    /// Decrypt an envelope and print its JSON.
    Open {
        envelope: String,
        /// Print the JSON on a single line.
        #[arg(long)]
        compact: bool,
    },
    /// Show the session directory and which session slots exist.
    Status,
    /// End the session: forget the key and remove the seed and salt.
    End,
}
