use std::fmt;

/// Run-wide tally of what a sync did, rendered once at the end of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub dry_run: bool,
    pub updated: usize,
    pub added: usize,
    pub removed: usize,
    pub failed_adds: Vec<String>,
    pub failed_updates: Vec<String>,
    pub duplicates: Vec<String>,
    pub missing_keywords: Vec<String>,
}

impl SyncSummary {
    pub fn add_update(&mut self) {
        self.updated += 1;
    }

    pub fn add_success(&mut self) {
        self.added += 1;
    }

    pub fn add_failed_add(&mut self, title: impl Into<String>) {
        self.failed_adds.push(title.into());
    }

    pub fn add_failed_update(&mut self, title: impl Into<String>) {
        self.failed_updates.push(title.into());
    }

    pub fn set_removed(&mut self, count: usize) {
        self.removed = count;
    }

    pub fn add_duplicate(&mut self, title: impl Into<String>) {
        self.duplicates.push(title.into());
    }

    pub fn add_missing_keywords(&mut self, title: impl Into<String>) {
        self.missing_keywords.push(title.into());
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_adds.is_empty() || !self.failed_updates.is_empty()
    }
}

fn write_titles(f: &mut fmt::Formatter<'_>, label: &str, titles: &[String]) -> fmt::Result {
    if titles.is_empty() {
        return Ok(());
    }
    writeln!(f, "{label} ({}):", titles.len())?;
    for title in titles {
        writeln!(f, "  - {title}")?;
    }
    Ok(())
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "would be " } else { "" };
        writeln!(f, "Summary{}:", if self.dry_run { " (dry run)" } else { "" })?;
        writeln!(f, "{} entries {verb}updated", self.updated)?;
        writeln!(f, "{} entries {verb}added", self.added)?;
        writeln!(f, "{} entries {verb}removed", self.removed)?;
        write_titles(f, "failed to add", &self.failed_adds)?;
        write_titles(f, "failed to update", &self.failed_updates)?;
        write_titles(f, "duplicates skipped", &self.duplicates)?;
        write_titles(f, "entries without keywords", &self.missing_keywords)?;
        Ok(())
    }
}
