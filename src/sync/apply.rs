use crate::remote::AccountService;
use crate::sync::reconcile::ReconciliationPlan;
use crate::sync::summary::SyncSummary;
use anyhow::{Context, Result};
use std::collections::HashSet;

/// Push a plan to the account: updates first, then the bulk delete, then
/// additions one at a time. Per-post update and add failures are recorded
/// and skipped; a failed bulk delete ends the run.
pub fn apply_plan(
    plan: ReconciliationPlan,
    service: &dyn AccountService,
    username: &str,
    dry_run: bool,
) -> Result<SyncSummary> {
    let mut summary = SyncSummary {
        dry_run,
        ..SyncSummary::default()
    };
    for title in plan.duplicates {
        summary.add_duplicate(title);
    }
    for title in plan.missing_keywords {
        summary.add_missing_keywords(title);
    }
    for skipped in plan.skipped_updates {
        tracing::debug!(title = %skipped.title, reason = %skipped.reason, "update skipped");
        summary.add_failed_update(skipped.title);
    }

    for pair in plan.updates {
        let post = pair.file.into_upload(username);
        if dry_run {
            tracing::info!(title = post.title(), "would update");
            summary.add_update();
            continue;
        }
        match service.update_post(&post) {
            Ok(()) => {
                tracing::info!(title = post.title(), "updated");
                summary.add_update();
            }
            Err(err) => {
                tracing::warn!(title = post.title(), error = %format!("{err:#}"), "post could not be updated");
                summary.add_failed_update(post.title());
            }
        }
    }

    // Account posts can share a hash; each one is deleted once.
    let mut seen = HashSet::new();
    let hashes = plan
        .deletions
        .iter()
        .map(|post| post.identity_hash())
        .filter(|hash| seen.insert(*hash))
        .map(str::to_string)
        .collect::<Vec<_>>();
    for post in &plan.deletions {
        tracing::info!(title = post.title(), "{}", if dry_run { "would remove" } else { "removing" });
    }
    if !dry_run && !hashes.is_empty() {
        service
            .delete_posts(username, &hashes)
            .with_context(|| format!("failed to delete {} posts", hashes.len()))?;
    }
    summary.set_removed(hashes.len());

    for post in plan.additions {
        let post = post.into_upload(username);
        let title = post.title().to_string();
        if dry_run {
            tracing::info!(title = %title, "would upload");
            summary.add_success();
            continue;
        }
        match service.create_post(&post) {
            Ok(Some(id)) => {
                tracing::info!(title = %title, id = %id, "uploaded");
                summary.add_success();
            }
            Ok(None) => {
                tracing::warn!(title = %title, "failed to upload");
                summary.add_failed_add(title);
            }
            Err(err) => {
                tracing::warn!(title = %title, error = %format!("{err:#}"), "failed to upload");
                summary.add_failed_add(title);
            }
        }
    }

    Ok(summary)
}
