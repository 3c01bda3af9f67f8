//! Non-streaming chat completion response shapes.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::message::{ContentPart, MessageContent, ToolCall};
use super::usage::Usage;

/// Response from `POST /chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

impl ChatCompletion {
    /// Text of the first choice, or an empty string.
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .and_then(FinishReason::parse)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: AssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant message inside a completion choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

impl AssistantMessage {
    /// Convert into history content: text first, then any tool calls.
    pub fn to_content(&self) -> MessageContent {
        let mut content = MessageContent::default();
        if let Some(text) = self.content.as_deref().filter(|t| !t.is_empty()) {
            content.push(ContentPart::text(text));
        }
        for tc in self.tool_calls.iter().flatten() {
            content.push(ContentPart::ToolCall(tc.to_tool_call()));
        }
        content
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireToolCall {
    pub id: String,
    pub function: WireFunction,
}

impl WireToolCall {
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall::from_raw(&self.id, &self.function.name, &self.function.arguments)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}
