use crate::bib::hash::compute_identity_hash;
use crate::bib::model::{Post, Resource};
use crate::bib::parser::{BibEntry, parse_bibliography};
use crate::error::BibSyncError;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const TYPED_FIELDS: [&str; 16] = [
    "title",
    "author",
    "editor",
    "year",
    "journal",
    "booktitle",
    "volume",
    "number",
    "pages",
    "publisher",
    "address",
    "url",
    "doi",
    "abstract",
    "keywords",
    "tags",
];

/// Split a BibTeX name list on `and`, ignoring occurrences inside braces.
fn split_people(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for word in raw.split_whitespace() {
        if depth == 0 && word.eq_ignore_ascii_case("and") {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        for ch in word.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn split_tags(raw: &str) -> BTreeSet<String> {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

pub fn entry_to_post(entry: &BibEntry) -> Post {
    let misc = entry
        .fields
        .iter()
        .filter(|(key, _)| !TYPED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.trim().to_string()))
        .collect::<BTreeMap<_, _>>();

    let people = |key: &str| {
        entry
            .get(key)
            .map(split_people)
            .filter(|list| !list.is_empty())
    };

    let mut resource = Resource {
        intra_hash: String::new(),
        entry_type: entry.entry_type.clone(),
        bibtex_key: entry.cite_key.clone(),
        title: entry.get("title").unwrap_or_default().trim().to_string(),
        authors: people("author"),
        editors: people("editor"),
        year: non_empty(entry.get("year")),
        journal: non_empty(entry.get("journal")),
        booktitle: non_empty(entry.get("booktitle")),
        volume: non_empty(entry.get("volume")),
        number: non_empty(entry.get("number")),
        pages: non_empty(entry.get("pages")),
        publisher: non_empty(entry.get("publisher")),
        address: non_empty(entry.get("address")),
        url: non_empty(entry.get("url")),
        doi: non_empty(entry.get("doi")),
        abstract_text: non_empty(entry.get("abstract")),
        misc: (!misc.is_empty()).then_some(misc),
    };
    resource.intra_hash = compute_identity_hash(&resource);
    if resource.title.is_empty() {
        tracing::warn!(key = %entry.cite_key, line = entry.line, "entry has no title");
    }

    let tags = entry
        .get("keywords")
        .or_else(|| entry.get("tags"))
        .map(split_tags)
        .unwrap_or_default();

    Post {
        tags,
        resource,
        ..Post::default()
    }
}

pub fn parse_entries(raw: &str) -> Result<Vec<Post>, BibSyncError> {
    let parsed = parse_bibliography(raw);
    if !parsed.errors.is_empty() {
        let lines = parsed
            .errors
            .iter()
            .map(|err| format!("line {}: {}", err.line, err.message))
            .collect::<Vec<_>>();
        return Err(BibSyncError::InvalidBibliography(lines.join("; ")));
    }
    Ok(parsed.entries.iter().map(entry_to_post).collect())
}

/// Read and parse the bibliography at `path`. Any unreadable or malformed
/// entry fails the whole load.
pub fn load_file_entries(path: &Path) -> Result<Vec<Post>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let posts =
        parse_entries(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    tracing::debug!(path = %path.display(), entries = posts.len(), "loaded bibliography");
    Ok(posts)
}
