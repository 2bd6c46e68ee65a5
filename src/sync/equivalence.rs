use crate::bib::model::{Post, Resource};
use crate::error::BibSyncError;
use std::collections::{BTreeMap, BTreeSet};

/// Post fields the remote service fills in or rewrites on every write. They
/// never take part in the equivalence check.
pub const SERVER_FIELDS: [&str; 4] = ["user", "groups", "changeDate", "date"];

trait NullOrEmpty {
    fn is_empty_value(&self) -> bool;
}

impl<T> NullOrEmpty for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> NullOrEmpty for BTreeSet<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> NullOrEmpty for BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

/// Equality where an empty collection counts as absent.
fn same_collection<C: PartialEq + NullOrEmpty>(a: &Option<C>, b: &Option<C>) -> bool {
    let a = a.as_ref().filter(|c| !c.is_empty_value());
    let b = b.as_ref().filter(|c| !c.is_empty_value());
    a == b
}

fn validate_tags(post: &Post) -> Result<(), BibSyncError> {
    for tag in &post.tags {
        if tag.trim().is_empty() {
            return Err(BibSyncError::MalformedField {
                field: "tags",
                title: post.title().to_string(),
                reason: "empty tag".to_string(),
            });
        }
        if tag.chars().any(char::is_whitespace) {
            return Err(BibSyncError::MalformedField {
                field: "tags",
                title: post.title().to_string(),
                reason: format!("tag `{tag}` contains whitespace"),
            });
        }
    }
    Ok(())
}

fn resource_difference(account: &Resource, file: &Resource) -> Option<&'static str> {
    // Destructured so a new resource field cannot be added without deciding
    // how it compares.
    let Resource {
        intra_hash,
        entry_type,
        bibtex_key,
        title,
        authors,
        editors,
        year,
        journal,
        booktitle,
        volume,
        number,
        pages,
        publisher,
        address,
        url,
        doi,
        abstract_text,
        misc,
    } = account;

    let checks = [
        ("intraHash", *intra_hash == file.intra_hash),
        ("entrytype", *entry_type == file.entry_type),
        ("bibtexKey", *bibtex_key == file.bibtex_key),
        ("title", *title == file.title),
        ("authors", same_collection(authors, &file.authors)),
        ("editors", same_collection(editors, &file.editors)),
        ("year", *year == file.year),
        ("journal", *journal == file.journal),
        ("booktitle", *booktitle == file.booktitle),
        ("volume", *volume == file.volume),
        ("number", *number == file.number),
        ("pages", *pages == file.pages),
        ("publisher", *publisher == file.publisher),
        ("address", *address == file.address),
        ("url", *url == file.url),
        ("doi", *doi == file.doi),
        ("abstract", *abstract_text == file.abstract_text),
        ("misc", same_collection(misc, &file.misc)),
    ];
    checks
        .into_iter()
        .find(|(_, same)| !same)
        .map(|(name, _)| name)
}

/// Name of the first field that differs between the account copy and the
/// file copy, or `None` when they are equivalent. Tags are compared after the
/// sentinel tag is applied to both sides.
pub fn first_difference(
    account: &Post,
    file: &Post,
) -> Result<Option<&'static str>, BibSyncError> {
    validate_tags(account)?;
    validate_tags(file)?;

    let Post {
        user: _,
        groups: _,
        change_date: _,
        date: _,
        tags: _,
        resource,
    } = account;

    if account.effective_tags() != file.effective_tags() {
        return Ok(Some("tags"));
    }
    Ok(resource_difference(resource, &file.resource))
}

pub fn is_equivalent(account: &Post, file: &Post) -> Result<bool, BibSyncError> {
    Ok(first_difference(account, file)?.is_none())
}
