use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use rotolog::config::{self, Config};
use rotolog::LogContext;

const USAGE: &str = "usage: rotolog [CONFIG] | rotolog --write-default PATH";

enum Command {
    Run(PathBuf),
    WriteDefault(PathBuf),
}

fn parse_args() -> Result<Command> {
    let mut args = std::env::args().skip(1);
    match (args.next(), args.next(), args.next()) {
        (None, _, _) => Ok(Command::Run(config::config_file_path())),
        (Some(flag), Some(path), None) if flag == "--write-default" => {
            Ok(Command::WriteDefault(PathBuf::from(path)))
        }
        (Some(path), None, None) if !path.starts_with('-') => Ok(Command::Run(PathBuf::from(path))),
        _ => bail!(USAGE),
    }
}

fn init_diagnostics() {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(true);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rotolog=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn main() -> Result<()> {
    init_diagnostics();

    let config_path = match parse_args()? {
        Command::WriteDefault(path) => {
            Config::default().save(&path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(());
        }
        Command::Run(path) => path,
    };

    let context = Arc::new(LogContext::from_config_file(&config_path)?);
    context.initialize()?;
    if let Some(path) = context.current_file() {
        tracing::info!("Logging to: {}", path.display());
    }

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        context.info(line);
    }

    context.shutdown();
    Ok(())
}
