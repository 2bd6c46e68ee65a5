use thiserror::Error;

#[derive(Debug, Error)]
pub enum BibSyncError {
    #[error("usage: bibsync <file> | bibsync <username> <apikey> <apiurl> <file> (got {0} arguments)")]
    Usage(usize),
    #[error("bibliography invalid: {0}")]
    InvalidBibliography(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("malformed field `{field}` on `{title}`: {reason}")]
    MalformedField {
        field: &'static str,
        title: String,
        reason: String,
    },
    #[error("{method} {url} failed with status {status}")]
    RemoteStatus {
        method: &'static str,
        url: String,
        status: u16,
    },
}
