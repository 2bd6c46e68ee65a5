use crate::bib::model::Post;
use crate::sync::equivalence::{SERVER_FIELDS, first_difference, is_equivalent};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePair {
    pub account: Post,
    pub file: Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUpdate {
    pub title: String,
    pub reason: String,
}

/// Everything a run needs to do to the account. No post appears in more
/// than one of `additions`, `deletions` and `updates`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub additions: Vec<Post>,
    pub deletions: Vec<Post>,
    pub updates: Vec<UpdatePair>,
    pub duplicates: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub skipped_updates: Vec<SkippedUpdate>,
}

impl ReconciliationPlan {
    pub fn is_noop(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty() && self.updates.is_empty()
    }
}

/// Keep the first post for every identity hash. Returns the kept posts and
/// the discarded duplicates, both in input order.
pub fn dedup_by_hash(entries: Vec<Post>) -> (Vec<Post>, Vec<Post>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(entries.len());
    let mut duplicates = Vec::new();
    for entry in entries {
        if seen.insert(entry.identity_hash().to_string()) {
            kept.push(entry);
        } else {
            duplicates.push(entry);
        }
    }
    (kept, duplicates)
}

pub fn reconcile(file_entries: Vec<Post>, account_entries: Vec<Post>) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    let (file_entries, duplicates) = dedup_by_hash(file_entries);
    for dup in &duplicates {
        tracing::warn!(title = dup.title(), hash = dup.identity_hash(), "duplicate entry in file");
        plan.duplicates.push(dup.title().to_string());
    }

    for entry in file_entries.iter().filter(|e| !e.has_tags()) {
        tracing::warn!(title = entry.title(), "please add keywords for entry");
        plan.missing_keywords.push(entry.title().to_string());
    }

    let mut account_by_hash: HashMap<&str, &Post> = HashMap::new();
    for post in &account_entries {
        account_by_hash.entry(post.identity_hash()).or_insert(post);
    }
    let file_hashes = file_entries
        .iter()
        .map(|e| e.identity_hash().to_string())
        .collect::<HashSet<_>>();

    tracing::debug!(ignored = ?SERVER_FIELDS, "comparing posts present on both sides");
    for mut file in file_entries {
        let Some(account) = account_by_hash.get(file.identity_hash()).copied() else {
            file.normalize_tags();
            plan.additions.push(file);
            continue;
        };

        match is_equivalent(account, &file) {
            Ok(true) => {
                tracing::debug!(title = file.title(), "already up to date");
            }
            Ok(false) => {
                let field = first_difference(account, &file).ok().flatten();
                tracing::debug!(title = file.title(), field = ?field, "account copy differs");
                file.normalize_tags();
                plan.updates.push(UpdatePair {
                    account: account.clone(),
                    file,
                });
            }
            Err(err) => {
                tracing::warn!(title = file.title(), error = %err, "post could not be compared; leaving it unchanged");
                plan.skipped_updates.push(SkippedUpdate {
                    title: file.title().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    plan.deletions = account_entries
        .iter()
        .filter(|post| !file_hashes.contains(post.identity_hash()))
        .cloned()
        .collect();

    plan
}
