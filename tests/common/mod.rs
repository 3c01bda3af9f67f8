//! Shared test helpers: a scripted completion backend and client builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use tela::client::{ChatRequest, CompletionBackend, TelaClient};
use tela::config::TelaConfig;
use tela::error::{Result, TelaError};
use tela::types::{ChatCompletion, ChatCompletionChunk, ChunkStream};
use tela::util::retry::RetryPolicy;

/// One scripted answer.
pub enum Scripted {
    Reply(String),
    Chunks(Vec<String>),
    /// Chunks followed by a mid-stream error.
    BrokenStream(Vec<String>),
    Fail(TelaError),
}

/// A backend that replays queued answers and records every request.
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, answer: Scripted) -> &Self {
        self.script.lock().unwrap().push_back(answer);
        self
    }

    pub fn queue_reply(&self, text: &str) -> &Self {
        self.queue(Scripted::Reply(text.to_string()))
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &ChatRequest) -> Scripted {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::Reply("Mock response".to_string()))
    }
}

pub fn completion(model: &str, text: &str) -> ChatCompletion {
    serde_json::from_value(serde_json::json!({
        "id": "cmpl-test",
        "created": 1,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
    }))
    .unwrap()
}

pub fn chunk(text: &str, finish: Option<&str>) -> ChatCompletionChunk {
    serde_json::from_value(serde_json::json!({
        "id": "chunk",
        "model": "wizard",
        "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": finish}]
    }))
    .unwrap()
}

fn chunk_items(parts: &[String]) -> Vec<Result<ChatCompletionChunk>> {
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, p)| Ok(chunk(p, (i == last).then_some("stop"))))
        .collect()
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        match self.next(request) {
            Scripted::Reply(text) => Ok(completion(&request.model, &text)),
            Scripted::Fail(err) => Err(err),
            Scripted::Chunks(_) | Scripted::BrokenStream(_) => Err(TelaError::InvalidState(
                "stream scripted for complete".into(),
            )),
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream<'static>> {
        match self.next(request) {
            Scripted::Chunks(parts) => Ok(Box::pin(stream::iter(chunk_items(&parts)))),
            Scripted::BrokenStream(parts) => {
                let mut items = chunk_items(&parts);
                items.push(Err(TelaError::Stream("connection reset".into())));
                Ok(Box::pin(stream::iter(items)))
            }
            Scripted::Reply(text) => Ok(Box::pin(stream::iter(chunk_items(&[text])))),
            Scripted::Fail(err) => Err(err),
        }
    }
}

pub fn test_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        multiplier: 1.0,
    }
}

pub fn test_config(base_url: &str) -> TelaConfig {
    TelaConfig::new("test-key", "org-test", "proj-test").with_base_url(base_url)
}

/// Client pointed at a mock server with fast retries.
pub fn test_client(base_url: &str, max_attempts: u32) -> TelaClient {
    TelaClient::new(test_config(base_url))
        .unwrap()
        .with_retry_policy(test_retry_policy(max_attempts))
}
