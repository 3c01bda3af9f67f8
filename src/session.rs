//! Completion facade that keeps a [`HistoryStore`] in step with the API.
//!
//! A turn is committed only after the model has answered: the user message and
//! the reply are appended together. Failed, cancelled, or empty responses leave
//! the conversation as it was (apart from get-or-create registering an empty
//! conversation).

use std::sync::Arc;

use bon::Builder;
use futures::StreamExt;
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::{ChatRequest, CompletionBackend, TelaClient};
use crate::error::{Result, TelaError};
use crate::history::{validate_conversation_id, ContextPolicy, HistoryStore};
use crate::types::{
    ChatCompletion, ChunkStream, FinishReason, GenerationSettings, Message, MessageContent, Role,
    StreamAccumulator, Usage,
};

/// Per-call options for [`ChatSession`].
#[derive(Debug, Clone, Default, Builder)]
pub struct SendOptions {
    /// Overrides the session's default model.
    #[builder(into)]
    pub model: Option<String>,
    #[builder(default)]
    pub settings: GenerationSettings,
    /// How much history to send.
    #[builder(default)]
    pub context: ContextPolicy,
    /// Retry transient failures before the response starts.
    #[builder(default)]
    pub retry: bool,
}

/// Result of [`ChatSession::send_message`].
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub conversation_id: String,
    /// The assistant message as appended to history.
    pub reply: Message,
    pub completion: ChatCompletion,
}

impl SendOutcome {
    pub fn text(&self) -> String {
        self.reply.text()
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.completion.usage.as_ref()
    }
}

/// Ties a completion backend to conversation history.
#[derive(Clone)]
pub struct ChatSession {
    backend: Arc<dyn CompletionBackend>,
    default_model: String,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn new(backend: Arc<dyn CompletionBackend>, default_model: impl Into<String>) -> Self {
        Self {
            backend,
            default_model: default_model.into(),
        }
    }

    /// Session over a [`TelaClient`], using its configured default model.
    pub fn from_client(client: TelaClient) -> Self {
        let model = client.config().default_model.clone();
        Self::new(Arc::new(client), model)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Stateless passthrough to the backend.
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        self.backend.complete(request).await
    }

    /// Send one user turn and append it, plus the reply, once the reply arrives.
    pub async fn send_message(
        &self,
        store: &mut HistoryStore,
        conversation_id: Option<&str>,
        content: impl Into<MessageContent>,
        options: &SendOptions,
    ) -> Result<SendOutcome> {
        let content = content.into();
        let (conversation_id, request) = self.prepare(store, conversation_id, &content, options)?;

        let completion = self.backend.complete(&request).await?;
        let choice = completion.choices.first().ok_or_else(|| {
            TelaError::InvalidState("completion response contained no choices".to_string())
        })?;
        let reply_content = choice.message.to_content();
        let extra = reply_metadata(
            if completion.model.is_empty() { &request.model } else { &completion.model },
            completion.finish_reason(),
            completion.usage.as_ref(),
        );

        let reply = commit_turn(store, &conversation_id, content, reply_content, extra)?;
        Ok(SendOutcome {
            conversation_id,
            reply,
            completion,
        })
    }

    /// Start a streaming turn without touching history.
    ///
    /// Drain [`StreamingTurn::stream`], then call [`StreamingTurn::commit`] to record it.
    pub async fn stream_message(
        &self,
        store: &mut HistoryStore,
        conversation_id: Option<&str>,
        content: impl Into<MessageContent>,
        options: &SendOptions,
    ) -> Result<StreamingTurn> {
        let content = content.into();
        let (conversation_id, request) = self.prepare(store, conversation_id, &content, options)?;
        let stream = self.backend.stream(&request).await?;
        Ok(StreamingTurn {
            conversation_id,
            model: request.model,
            prompt: content,
            stream,
        })
    }

    /// Stream a turn and record it in `store` when the stream completes.
    ///
    /// Chunks are passed through as they arrive. The user message and the
    /// accumulated reply are appended in one step after the last chunk. If the
    /// stream errors or is dropped early, nothing is appended.
    pub async fn stream_message_with_history<'a>(
        &self,
        store: &'a mut HistoryStore,
        conversation_id: Option<&str>,
        content: impl Into<MessageContent>,
        options: &SendOptions,
    ) -> Result<ChunkStream<'a>> {
        let turn = self
            .stream_message(store, conversation_id, content, options)
            .await?;
        let StreamingTurn {
            conversation_id,
            model,
            prompt,
            mut stream,
        } = turn;

        let stream = async_stream::stream! {
            let mut acc = StreamAccumulator::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => {
                        acc.push(&chunk);
                        yield Ok(chunk);
                    }
                    Err(err) => {
                        debug!(conversation_id = %conversation_id, error = %err, "stream failed; turn discarded");
                        yield Err(err);
                        return;
                    }
                }
            }

            let reply = acc.finish();
            let extra = reply_metadata(&model, reply.finish_reason, reply.usage.as_ref());
            if let Err(err) = commit_turn(store, &conversation_id, prompt, reply.content, extra) {
                yield Err(err);
            }
        };
        Ok(Box::pin(stream))
    }

    fn prepare(
        &self,
        store: &mut HistoryStore,
        conversation_id: Option<&str>,
        content: &MessageContent,
        options: &SendOptions,
    ) -> Result<(String, ChatRequest)> {
        let conversation_id = match conversation_id {
            Some(id) => {
                validate_conversation_id(id)?;
                id.to_string()
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        store.get_or_create(&conversation_id);

        let conversation = store
            .get(&conversation_id)
            .ok_or_else(|| TelaError::NotFound(conversation_id.clone()))?;
        // Validates the prompt before anything goes over the wire.
        let prompt = Message::new(
            Role::User,
            content.clone(),
            None,
            conversation.len(),
            Map::new(),
        )?;

        // The prompt is always sent, so its cost comes out of a token budget first.
        let estimator = store.estimator();
        let window = match options.context {
            ContextPolicy::TokenBudget {
                max_tokens,
                preserve_system,
            } => conversation.context_window_with(
                max_tokens.saturating_sub(estimator.estimate(&prompt)),
                preserve_system,
                estimator,
            ),
            ref policy => conversation.select(policy, estimator),
        };
        let mut messages = window.to_wire();
        messages.push(prompt.to_wire());

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        debug!(conversation_id = %conversation_id, model = %model, messages = messages.len(), "sending turn");

        let request = ChatRequest::new(model, messages)
            .with_settings(options.settings.clone())
            .with_retry(options.retry);
        Ok((conversation_id, request))
    }
}

/// A streaming turn that has not been recorded yet.
pub struct StreamingTurn {
    conversation_id: String,
    model: String,
    prompt: MessageContent,
    stream: ChunkStream<'static>,
}

impl std::fmt::Debug for StreamingTurn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingTurn")
            .field("conversation_id", &self.conversation_id)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl StreamingTurn {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn stream(&mut self) -> &mut ChunkStream<'static> {
        &mut self.stream
    }

    /// Drain the stream and return the concatenated text.
    pub async fn collect_text(&mut self) -> Result<String> {
        let mut acc = StreamAccumulator::new();
        while let Some(chunk) = self.stream.next().await {
            acc.push(&chunk?);
        }
        Ok(acc.text().to_string())
    }

    /// Append the prompt and `reply` to the conversation.
    pub fn commit(self, store: &mut HistoryStore, reply: impl Into<MessageContent>) -> Result<Message> {
        let extra = reply_metadata(&self.model, None, None);
        commit_turn(store, &self.conversation_id, self.prompt, reply.into(), extra)
    }
}

fn reply_metadata(
    model: &str,
    finish_reason: Option<FinishReason>,
    usage: Option<&Usage>,
) -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert("model".into(), model.into());
    if let Some(reason) = finish_reason {
        extra.insert("finish_reason".into(), reason.to_string().into());
    }
    if let Some(usage) = usage {
        if let Ok(value) = serde_json::to_value(usage) {
            extra.insert("usage".into(), value);
        }
    }
    extra
}

/// Append prompt and reply together, or neither.
fn commit_turn(
    store: &mut HistoryStore,
    conversation_id: &str,
    prompt: MessageContent,
    reply: MessageContent,
    extra: Map<String, Value>,
) -> Result<Message> {
    if reply.is_blank() {
        return Err(TelaError::InvalidState(
            "model returned an empty reply; turn not recorded".to_string(),
        ));
    }
    if prompt.is_blank() {
        return Err(TelaError::Validation(
            "Content cannot be empty for user messages".to_string(),
        ));
    }

    let conversation = store.get_or_create(conversation_id);
    conversation.append(Role::User, prompt)?;
    let reply = conversation
        .append_with_metadata(Role::Assistant, reply, None, extra)?
        .clone();
    Ok(reply)
}
