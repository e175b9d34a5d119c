use thiserror::Error;

/// Failure of a persistence operation. Stores log these and hand them back
/// so callers may ignore them (the UI degrades to the cached state) or assert
/// on them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no authenticated user")]
    Unauthenticated,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Backend {
        status: u16,
        body: String,
    },

    #[error("conflicting row: {0}")]
    Conflict(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result of a toggle on the saved set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Saved,
    Removed,
}

impl SaveState {
    pub fn is_saved(self) -> bool {
        matches!(self, SaveState::Saved)
    }
}
