use crate::bib::model::Resource;
use sha2::{Digest, Sha256};

fn normalize_text(input: &str) -> String {
    let stripped: String = input
        .chars()
        .filter(|ch| !matches!(ch, '{' | '}' | '\\'))
        .collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize_opt(value: Option<&str>) -> String {
    value.map(normalize_text).unwrap_or_default()
}

fn normalize_people(people: Option<&Vec<String>>) -> String {
    let mut names = people
        .into_iter()
        .flatten()
        .map(|name| normalize_text(name))
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    names.sort();
    names.join("; ")
}

/// Content fingerprint of a publication. Only bibliographic content goes in;
/// server-assigned fields never do. Person lists are sorted and an absent list
/// hashes the same as an empty one.
pub fn compute_identity_hash(resource: &Resource) -> String {
    let canonical = format!(
        "title={}\nauthors={}\neditors={}\nyear={}\ntype={}\njournal={}\nbooktitle={}\nvolume={}\nnumber={}\n",
        normalize_text(&resource.title),
        normalize_people(resource.authors.as_ref()),
        normalize_people(resource.editors.as_ref()),
        normalize_opt(resource.year.as_deref()),
        normalize_text(&resource.entry_type),
        normalize_opt(resource.journal.as_deref()),
        normalize_opt(resource.booktitle.as_deref()),
        normalize_opt(resource.volume.as_deref()),
        normalize_opt(resource.number.as_deref()),
    );
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}
