//! Error types for relabel

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The issue source was unreachable or returned something unusable.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A timeline could not be replayed (malformed event).
    #[error("Replay failed for issue #{issue}: {reason}")]
    Replay { issue: u64, reason: String },

    /// The rule table or config file is invalid.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A single add/remove call against the tracker failed.
    #[error("Mutation failed for issue #{issue} ({label}): {reason}")]
    Mutation {
        issue: u64,
        label: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
