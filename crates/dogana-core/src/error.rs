//! Error taxonomy of the routing pipeline.
//!
//! "No evidence" is not an error: it is [`crate::orchestrator::RouteOutcome::NoResults`].

use std::future::Future;
use std::time::Duration;

use dogana_llm::LlmError;
use dogana_store::StoreError;

use crate::registry::RegistryError;

/// Input rejected before (or instead of) calling a collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("domanda vuota.")]
    EmptyQuestion,

    #[error(
        "contesto troppo lungo ({len} caratteri). Limite: {max}. \
         Ridurre top_k o max_context_chars."
    )]
    ContextTooLong { len: usize, max: usize },
}

/// Failure of the embedding, completion or datastore collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("LLM provider: {0}")]
    Llm(#[from] LlmError),

    #[error("datastore: {0}")]
    Store(#[from] StoreError),

    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Provider(#[from] ProviderError),
}

/// Coarse category of a [`RouteError`], used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Configuration,
    Provider,
}

impl RouteError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Provider(_) => ErrorKind::Provider,
        }
    }

    #[must_use]
    pub fn is_provider(&self) -> bool {
        self.kind() == ErrorKind::Provider
    }
}

impl From<LlmError> for RouteError {
    fn from(e: LlmError) -> Self {
        Self::Provider(ProviderError::Llm(e))
    }
}

impl From<StoreError> for RouteError {
    fn from(e: StoreError) -> Self {
        Self::Provider(ProviderError::Store(e))
    }
}

impl From<RegistryError> for RouteError {
    fn from(e: RegistryError) -> Self {
        Self::Configuration(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;

/// Await a collaborator call, turning expiry of `limit` into a provider error.
pub(crate) async fn with_timeout<T, E>(
    operation: &'static str,
    limit: Duration,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    RouteError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(RouteError::from),
        Err(_) => {
            tracing::error!("{operation} timed out after {}s", limit.as_secs());
            Err(ProviderError::Timeout {
                operation,
                seconds: limit.as_secs(),
            }
            .into())
        }
    }
}
