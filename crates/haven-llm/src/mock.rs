//! Scriptable mock provider for tests
//!
//! Supports fixed or queued replies and failure injection so breaker,
//! retry, and fallback behavior can be exercised without network access.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ModelInfo, Usage};
use crate::{GatewayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    None,
    Network,
    RateLimited,
    BadRequest,
    ServerError,
}

/// Mock LLM provider with scriptable behavior
pub struct MockLlmProvider {
    name: String,
    default_reply: String,
    queued_replies: Mutex<VecDeque<String>>,
    failure_mode: FailureMode,
    /// Fail this many calls before succeeding (network errors).
    fail_first: AtomicU32,
    calls: AtomicU32,
    requests: Mutex<Vec<ChatRequest>>,
    embed_dimensions: usize,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_reply: "mock reply".to_string(),
            queued_replies: Mutex::new(VecDeque::new()),
            failure_mode: FailureMode::None,
            fail_first: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            embed_dimensions: 8,
        }
    }

    /// Fixed reply returned when the queue is empty.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    /// Queue replies returned in order, one per call.
    pub fn with_replies(self, replies: impl IntoIterator<Item = String>) -> Self {
        self.queued_replies.lock().extend(replies);
        self
    }

    /// Append one reply to the queue after construction.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.queued_replies.lock().push_back(reply.into());
    }

    pub fn always_failing(mut self) -> Self {
        self.failure_mode = FailureMode::Network;
        self
    }

    pub fn always_rate_limited(mut self) -> Self {
        self.failure_mode = FailureMode::RateLimited;
        self
    }

    pub fn always_bad_request(mut self) -> Self {
        self.failure_mode = FailureMode::BadRequest;
        self
    }

    pub fn always_server_error(mut self) -> Self {
        self.failure_mode = FailureMode::ServerError;
        self
    }

    /// Fail the first `n` calls with network errors, then succeed.
    pub fn fail_times(self, n: u32) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().last().cloned()
    }

    fn next_error(&self) -> Option<GatewayError> {
        match self.failure_mode {
            FailureMode::Network => Some(GatewayError::Network("mock network failure".to_string())),
            FailureMode::RateLimited => Some(GatewayError::RateLimited {
                retry_after_ms: Some(10),
            }),
            FailureMode::BadRequest => {
                Some(GatewayError::BadRequest("mock rejected request".to_string()))
            }
            FailureMode::ServerError => Some(GatewayError::Provider {
                status: 503,
                message: "mock upstream unavailable".to_string(),
            }),
            FailureMode::None => {
                let remaining = self.fail_first.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.fail_first.store(remaining - 1, Ordering::SeqCst);
                    Some(GatewayError::Network("mock transient failure".to_string()))
                } else {
                    None
                }
            }
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(error) = self.next_error() {
            return Err(error);
        }

        let content = self
            .queued_replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        let prompt_tokens = request
            .messages
            .iter()
            .map(|m| m.content.split_whitespace().count() as u32)
            .sum();
        let completion_tokens = content.split_whitespace().count() as u32;

        Ok(ChatResponse {
            id: Uuid::new_v4(),
            request_id: request.request_id,
            model: model.to_string(),
            content,
            finish_reason: "stop".to_string(),
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            provider: self.name.clone(),
            latency_ms: 0,
        })
    }

    async fn embed(&self, _model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_error() {
            return Err(error);
        }
        Ok(inputs
            .iter()
            .map(|input| {
                let seed = input.len() as f32;
                (0..self.embed_dimensions)
                    .map(|i| (seed + i as f32) / 100.0)
                    .collect()
            })
            .collect())
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: format!("{}-model", self.name),
            provider: self.name.clone(),
            supports_embeddings: true,
        }]
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::Message;

    #[tokio::test]
    async fn queued_replies_drain_in_order() {
        let provider = MockLlmProvider::new()
            .with_replies(["first".to_string(), "second".to_string()])
            .with_reply("default");
        let request = ChatRequest::new("m", vec![Message::user("hi")]);

        assert_eq!(provider.chat("m", &request).await.unwrap().content, "first");
        assert_eq!(provider.chat("m", &request).await.unwrap().content, "second");
        assert_eq!(
            provider.chat("m", &request).await.unwrap().content,
            "default"
        );
    }

    #[tokio::test]
    async fn fail_times_recovers_after_n_calls() {
        let provider = MockLlmProvider::new().fail_times(2);
        let request = ChatRequest::new("m", vec![Message::user("hi")]);

        assert!(provider.chat("m", &request).await.is_err());
        assert!(provider.chat("m", &request).await.is_err());
        assert!(provider.chat("m", &request).await.is_ok());
    }
}
