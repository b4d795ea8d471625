use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use tabseal_cli::{Cli, Session, load_config};
use tabseal_logger::{LogFormat, Logger, parse_level, parse_rotation};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            if output.is_empty() || writeln!(std::io::stdout().lock(), "{output}").is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            let _ = writeln!(std::io::stderr().lock(), "tabseal: {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let mut cfg = load_config(cli.config.as_deref()).context("Configuration is malformed")?;
    if let Some(dir) = cli.session_dir {
        cfg.session_dir = dir;
    }

    let logger = Logger::builder()
        .name(env!("CARGO_PKG_NAME"))
        .format(cfg.log_format.parse::<LogFormat>()?)
        .level(parse_level(&cfg.log_level)?)
        .verbosity(cli.verbose);
    let _log = match cfg.log_dir {
        Some(dir) => logger
            .path(dir)
            .rotation(parse_rotation(&cfg.log_rotation)?)
            .max_files(cfg.log_max_files)
            .init()?,
        None => logger.init()?,
    };

    let session = Session::open(&cfg.session_dir, cfg.vault).await?;
    session.execute(&cli.command).await
}
