use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    /// Registry invariant violated. Every property rendered into a feed must
    /// be declared in the property registry, so this surfacing at runtime is a
    /// configuration bug, not a client error.
    #[error("Unknown feed property: {0}")]
    UnknownProperty(String),

    #[error("Unsupported filter syntax: {0}")]
    UnsupportedFilterSyntax(String),

    #[error("Invalid version count")]
    MismatchedUpdateParameters,

    #[error("Resource not found for the segment '{0}'.")]
    RecordNotFound(String),

    #[error("SQLite database error: {0}")]
    Rusqlite(#[from] rusqlite::Error),

    #[error("IO error while {action}: {source}")]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Thread lock poison error")]
    PoisonError,

    #[error("{0}")]
    Custom(String),
}
