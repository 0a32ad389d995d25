#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("{provider} rejected the credentials (status {status})")]
    Unauthorized { provider: String, status: u16 },

    #[error("{provider} request failed (status {status})")]
    Status { provider: String, status: u16 },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("embedding requires non-empty text")]
    EmptyInput,

    #[error("embedding not configured for {provider}")]
    EmbedUnsupported { provider: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
