//! Streaming types.

use std::collections::BTreeMap;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::message::{ContentPart, MessageContent, ToolCall};
use super::usage::Usage;
use crate::error::TelaError;

/// Stream of incremental completion chunks.
pub type ChunkStream<'a> = BoxStream<'a, Result<ChatCompletionChunk, TelaError>>;

/// A single server-sent chunk of a streaming completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    /// Text fragment carried by the first choice.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Partial tool call; fragments sharing an `index` are concatenated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Folds chunks into a final reply.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    tool_calls: BTreeMap<u32, (String, String, String)>,
    chunks: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &ChatCompletionChunk) {
        self.chunks += 1;
        if let Some(usage) = &chunk.usage {
            self.usage = Some(usage.clone());
        }
        let Some(choice) = chunk.choices.first() else {
            return;
        };
        if let Some(content) = &choice.delta.content {
            self.text.push_str(content);
        }
        if let Some(reason) = choice.finish_reason.as_deref().and_then(FinishReason::parse) {
            self.finish_reason = Some(reason);
        }
        for delta in choice.delta.tool_calls.iter().flatten() {
            let entry = self.tool_calls.entry(delta.index).or_default();
            if let Some(id) = &delta.id {
                entry.0.push_str(id);
            }
            if let Some(function) = &delta.function {
                if let Some(name) = &function.name {
                    entry.1.push_str(name);
                }
                if let Some(args) = &function.arguments {
                    entry.2.push_str(args);
                }
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    pub fn finish(self) -> StreamedReply {
        let mut content = MessageContent::default();
        if !self.text.is_empty() {
            content.push(ContentPart::Text { text: self.text });
        }
        for (_, (id, name, args)) in self.tool_calls {
            content.push(ContentPart::ToolCall(ToolCall::from_raw(id, name, args)));
        }
        StreamedReply {
            content,
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}

/// Final result after consuming a chunk stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamedReply {
    pub content: MessageContent,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
}
