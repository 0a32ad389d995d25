#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("datastore rejected the credentials (status {status})")]
    Unauthorized { status: u16 },

    #[error("datastore request failed (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
