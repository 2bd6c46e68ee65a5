use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder tag for posts that carry no keywords of their own. The remote
/// service rejects posts with an empty tag set.
pub const SENTINEL_TAG: &str = "nokeyword";

/// Naive layouts some servers use for timestamps, read as UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// `null` reads as the type's default, so a server that sends `null` for an
/// empty collection or string is treated like one that omits the field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn parse_server_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Server timestamps never take part in comparisons, so one in an unknown
/// format is dropped instead of failing the whole post.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let parsed = raw.as_str().and_then(parse_server_timestamp);
    if parsed.is_none() {
        tracing::debug!(value = %raw, "ignoring unreadable server timestamp");
    }
    Ok(parsed)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// The publication record a post points at. Everything in here is compared
/// when deciding whether an account copy needs an update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resource {
    #[serde(deserialize_with = "null_as_default")]
    pub intra_hash: String,
    #[serde(rename = "entrytype", deserialize_with = "null_as_default")]
    pub entry_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub bibtex_key: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub authors: Option<Vec<String>>,
    pub editors: Option<Vec<String>>,
    pub year: Option<String>,
    pub journal: Option<String>,
    pub booktitle: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub pages: Option<String>,
    pub publisher: Option<String>,
    pub address: Option<String>,
    pub url: Option<String>,
    pub doi: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub misc: Option<BTreeMap<String, String>>,
}

/// One bibliographic post owned by one account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Post {
    pub user: Option<User>,
    pub groups: Option<BTreeSet<String>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub change_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: BTreeSet<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub resource: Resource,
}

impl Post {
    pub fn identity_hash(&self) -> &str {
        &self.resource.intra_hash
    }

    pub fn title(&self) -> &str {
        &self.resource.title
    }

    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Apply the sentinel tag when the tag set is empty. Idempotent.
    pub fn normalize_tags(&mut self) {
        if self.tags.is_empty() {
            self.tags.insert(SENTINEL_TAG.to_string());
        }
    }

    /// Tags as they would look after [`Post::normalize_tags`], without
    /// mutating the post.
    pub fn effective_tags(&self) -> BTreeSet<String> {
        let mut tags = self.tags.clone();
        if tags.is_empty() {
            tags.insert(SENTINEL_TAG.to_string());
        }
        tags
    }

    /// Prepare a post for upload to `owner`'s account.
    pub fn into_upload(mut self, owner: &str) -> Self {
        self.user = Some(User::new(owner));
        self.normalize_tags();
        self
    }
}
