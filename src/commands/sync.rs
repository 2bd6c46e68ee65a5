use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::bib::loader::load_file_entries;
use crate::commands::CommandReport;
use crate::remote::fetch_all_posts;
use crate::remote::rest::RestAccount;
use crate::sync::apply::apply_plan;
use crate::sync::config::BibSyncConfig;
use crate::sync::reconcile::reconcile;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub username: String,
    pub api_key: String,
    pub api_url: String,
    pub file: PathBuf,
    pub dry_run: bool,
}

/// Bring the account of `opts.username` in line with the bibliography file.
pub fn run(opts: &SyncOptions, cfg: &BibSyncConfig) -> Result<CommandReport> {
    let mut report = CommandReport::new("sync");
    let dry_run = opts.dry_run || cfg.run.dry_run;

    let file_entries = load_file_entries(&opts.file)?;
    let account = RestAccount::new(
        &opts.api_url,
        &opts.username,
        &opts.api_key,
        cfg.remote.request_timeout_secs,
        &cfg.remote.user_agent,
    )?;
    let account_entries = fetch_all_posts(&account, &opts.username, cfg.remote.page_size)
        .with_context(|| format!("failed to read posts of {}", opts.username))?;
    tracing::info!(
        file_entries = file_entries.len(),
        account_entries = account_entries.len(),
        user = %opts.username,
        "loaded entries"
    );

    let plan = reconcile(file_entries, account_entries);
    if plan.is_noop() {
        report.detail("account already matches the file");
    }
    let summary = apply_plan(plan, &account, &opts.username, dry_run)?;
    if summary.has_failures() {
        tracing::warn!(
            failed_adds = summary.failed_adds.len(),
            failed_updates = summary.failed_updates.len(),
            "some posts were not synced; see summary"
        );
    }

    for line in summary.to_string().lines() {
        report.detail(line);
    }
    Ok(report)
}
