use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KinoError {
    /// DNS, connection, timeout or non-2xx status while talking to a remote host.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The catalogue page was fetched fine but contained no usable entries.
    #[error("no results found for query: {query}")]
    NotFound { query: String },

    #[error("cache directory {path:?} is unavailable: {source}")]
    CacheUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("selector failed: {0}")]
    Selector(String),

    #[error("could not resolve stream: {0}")]
    Resolve(String),

    #[error("player failed: {0}")]
    Player(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KinoError {
    /// True for the "nothing matched" outcome, which callers report as a
    /// message rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KinoError::NotFound { .. })
    }
}

pub type Result<T, E = KinoError> = std::result::Result<T, E>;
