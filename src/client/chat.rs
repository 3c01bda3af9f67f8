//! Chat completions: request body, backend trait, and the HTTP implementation.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::{http, TelaClient};
use crate::error::{Result, TelaError};
use crate::types::{ChatCompletion, ChatCompletionChunk, ChunkStream, GenerationSettings, Message};

/// A single chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    /// Messages already rendered in wire format.
    pub messages: Vec<Value>,
    pub settings: GenerationSettings,
    /// Retry transient failures. Off by default since completions are not idempotent.
    pub retry: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            settings: GenerationSettings::default(),
            retry: false,
        }
    }

    /// Build from history messages.
    pub fn from_messages<'a>(
        model: impl Into<String>,
        messages: impl IntoIterator<Item = &'a Message>,
    ) -> Self {
        Self::new(model, messages.into_iter().map(Message::to_wire).collect())
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(TelaError::Validation("model must not be empty".to_string()));
        }
        if self.messages.is_empty() {
            return Err(TelaError::Validation(
                "at least one message is required".to_string(),
            ));
        }
        Ok(())
    }

    /// JSON body for `POST /chat/completions`.
    pub fn to_body(&self, stream: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("model".into(), self.model.clone().into());
        obj.insert("messages".into(), Value::Array(self.messages.clone()));
        obj.insert("stream".into(), stream.into());
        self.settings.apply_to(&mut obj);
        Value::Object(obj)
    }
}

/// Anything able to answer chat-completion requests.
///
/// [`TelaClient`] is the production implementation; tests substitute scripted backends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion>;

    /// Start a streaming completion. Errors before the first chunk are returned directly.
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream<'static>>;
}

#[async_trait]
impl CompletionBackend for TelaClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        request.validate()?;
        let body = request.to_body(false);
        debug!(model = %request.model, messages = request.messages.len(), "chat completion");

        let url = self.url("chat/completions");
        let completion: ChatCompletion = self.post_json(&url, &body, request.retry).await?;
        if completion.choices.is_empty() {
            return Err(TelaError::InvalidState(
                "completion response contained no choices".to_string(),
            ));
        }
        Ok(completion)
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream<'static>> {
        request.validate()?;
        let body = request.to_body(true);
        let url = self.url("chat/completions");
        debug!(model = %request.model, messages = request.messages.len(), "chat completion stream");

        let connect = || async {
            self.execute(
                self.http()
                    .post(&url)
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .json(&body),
            )
            .await
        };
        let resp = if request.retry {
            self.retry_policy().execute(connect).await?
        } else {
            connect().await?
        };

        Ok(http::sse_stream::<ChatCompletionChunk>(resp, self.timeout_ms()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResponseFormat, ToolChoice};
    use pretty_assertions::assert_eq;

    #[test]
    fn body_includes_only_populated_settings() {
        let settings = GenerationSettings::builder()
            .temperature(0.3)
            .max_tokens(64)
            .user("u-1")
            .build();
        let request = ChatRequest::new("wizard", vec![serde_json::json!({"role": "user", "content": "hi"})])
            .with_settings(settings);

        assert_eq!(
            request.to_body(false),
            serde_json::json!({
                "model": "wizard",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false,
                "temperature": 0.3,
                "max_tokens": 64,
                "user": "u-1",
            })
        );
    }

    #[test]
    fn body_renders_tool_choice_and_response_format() {
        let settings = GenerationSettings::builder()
            .tool_choice(ToolChoice::Required)
            .response_format(ResponseFormat::JsonObject)
            .build();
        let body = ChatRequest::new("wizard", vec![serde_json::json!({"role": "user", "content": "x"})])
            .with_settings(settings)
            .to_body(true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn empty_request_is_rejected() {
        assert!(matches!(
            ChatRequest::new("wizard", vec![]).validate(),
            Err(TelaError::Validation(_))
        ));
        assert!(matches!(
            ChatRequest::new(" ", vec![Value::Null]).validate(),
            Err(TelaError::Validation(_))
        ));
    }
}
