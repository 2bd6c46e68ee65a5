use anyhow::Result;
use std::path::PathBuf;

use crate::bib::loader::load_file_entries;
use crate::commands::CommandReport;
use crate::sync::reconcile::reconcile;

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub file: PathBuf,
}

/// Parse and validate a bibliography without touching any account.
pub fn run(opts: &CheckOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("check");
    let posts = load_file_entries(&opts.file)?;

    report.detail(format!("file={}", opts.file.display()));
    report.detail(format!("entries={}", posts.len()));

    for post in posts.iter().filter(|p| p.title().trim().is_empty()) {
        report.issue(format!(
            "entry `{}` has no title",
            post.resource.bibtex_key
        ));
    }

    // Against an empty account every unique entry becomes an addition.
    let plan = reconcile(posts, Vec::new());
    report.detail(format!("unique_entries={}", plan.additions.len()));
    for title in &plan.duplicates {
        report.detail(format!("duplicate={title}"));
    }
    for title in &plan.missing_keywords {
        report.detail(format!("missing_keywords={title}"));
    }

    Ok(report)
}
