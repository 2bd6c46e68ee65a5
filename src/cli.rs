use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use crate::commands::check::{self, CheckOptions};
use crate::commands::sync::{self, SyncOptions};
use crate::env_loader;
use crate::error::BibSyncError;
use crate::logging;
use crate::sync::config::load_config;

#[derive(Debug, Parser)]
#[command(
    name = "bibsync",
    version,
    about = "Keep a bibliography account in sync with a BibTeX file"
)]
pub struct Cli {
    /// `FILE` to validate only, or `USERNAME API_KEY API_URL FILE` to sync.
    /// Flags go before these; an API key may start with `-`.
    #[arg(value_name = "ARGS", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Compute and log the plan without writing to the account.
    #[arg(long)]
    pub dry_run: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run(dotenv: Option<&Path>) -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    tracing::debug!(dotenv = %env_loader::describe(dotenv), "environment loaded");

    let report = match cli.args.as_slice() {
        [file] => check::run(&CheckOptions {
            file: PathBuf::from(file),
        })?,
        [username, api_key, api_url, file] => {
            let cfg = load_config()?;
            sync::run(
                &SyncOptions {
                    username: username.clone(),
                    api_key: api_key.clone(),
                    api_url: api_url.clone(),
                    file: PathBuf::from(file),
                    dry_run: cli.dry_run,
                },
                &cfg,
            )?
        }
        other => {
            tracing::error!("call with parameters: username apikey apiurl file");
            return Err(BibSyncError::Usage(other.len()).into());
        }
    };

    report.emit();
    if !report.ok {
        anyhow::bail!(
            "{} reported {} issue(s)",
            report.command,
            report.issues.len()
        );
    }
    Ok(())
}
