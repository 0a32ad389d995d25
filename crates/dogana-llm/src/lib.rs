//! Chat-completion and embedding provider abstraction.
//!
//! The retrieval pipeline talks to a single [`LlmProvider`] for both the
//! embedding step and the final answer. [`openai::OpenAiProvider`] covers the
//! OpenAI API and any endpoint compatible with it.

pub mod error;
mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;

pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
