//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

/// Scriptable provider that records every call it receives.
///
/// Clones share the call log, so a test can hand one clone to the code under
/// test and inspect the other afterwards.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    chat_log: Arc<Mutex<Vec<Vec<Message>>>>,
    embed_log: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    pub fail_chat: bool,
    pub fail_embed: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            chat_log: Arc::new(Mutex::new(Vec::new())),
            embed_log: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: vec![1.0, 0.0, 0.0],
            fail_chat: false,
            fail_embed: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_embed() -> Self {
        Self {
            fail_embed: true,
            ..Self::default()
        }
    }

    /// Every message list passed to [`LlmProvider::chat`], in call order.
    #[must_use]
    pub fn chat_calls(&self) -> Vec<Vec<Message>> {
        self.chat_log.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Every text passed to [`LlmProvider::embed`], in call order.
    #[must_use]
    pub fn embed_calls(&self) -> Vec<String> {
        self.embed_log.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut log) = self.chat_log.lock() {
            log.push(messages.to_vec());
        }
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut r| (!r.is_empty()).then(|| r.remove(0)));
        Ok(next.unwrap_or_else(|| self.default_response.clone()))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if let Ok(mut log) = self.embed_log.lock() {
            log.push(text.to_owned());
        }
        if text.trim().is_empty() {
            return Err(LlmError::EmptyInput);
        }
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        Ok(self.embedding.clone())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
