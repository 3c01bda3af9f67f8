//! A single conversation: an append-only, ordered list of messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use super::estimator::{CharRatioEstimator, TokenEstimator};
use crate::error::{Result, TelaError};
use crate::types::{Message, MessageContent, Role};

/// Ordered, append-only message history under one id.
///
/// Messages can only be added through the `append*` methods, which validate
/// them and stamp their metadata. Existing messages are never changed or
/// reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_id: Option<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            remote_id: None,
            metadata: Map::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// Check messages read from outside `append*`: each must be valid and
    /// carry its own position as sequence number.
    pub(crate) fn validate(&self) -> Result<()> {
        for (index, message) in self.messages.iter().enumerate() {
            message.validate()?;
            if message.metadata.sequence != index {
                return Err(TelaError::Validation(format!(
                    "message {index} has sequence {}",
                    message.metadata.sequence
                )));
            }
        }
        Ok(())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Append a message and return it.
    ///
    /// Fails with `Validation` for blank content on a non-tool role, or for a
    /// tool message (which needs [`append_tool_result`](Self::append_tool_result)).
    pub fn append(&mut self, role: Role, content: impl Into<MessageContent>) -> Result<&Message> {
        self.append_with_metadata(role, content.into(), None, Map::new())
    }

    /// Append the result of a tool call.
    pub fn append_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        content: impl Into<MessageContent>,
    ) -> Result<&Message> {
        self.append_with_metadata(Role::Tool, content.into(), Some(tool_call_id.into()), Map::new())
    }

    /// Append with extra per-message metadata (model, usage, ...).
    pub fn append_with_metadata(
        &mut self,
        role: Role,
        content: MessageContent,
        tool_call_id: Option<String>,
        extra: Map<String, Value>,
    ) -> Result<&Message> {
        let message = Message::new(role, content, tool_call_id, self.messages.len(), extra)?;
        self.updated_at = message.metadata.timestamp;
        self.messages.push(message);
        Ok(&self.messages[self.messages.len() - 1])
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Full history in request-body form, in append order.
    pub fn get_messages(&self) -> Vec<Value> {
        self.messages.iter().map(Message::to_wire).collect()
    }

    pub fn messages_with_role(&self, role: Role) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().filter(move |m| m.role == role)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn set_remote_id(&mut self, remote_id: impl Into<String>) {
        self.remote_id = Some(remote_id.into());
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
        self.updated_at = Utc::now();
    }

    /// Token-budgeted window using the default 4-chars-per-token estimate.
    pub fn context_window(&self, max_tokens: usize, preserve_system: bool) -> ContextWindow<'_> {
        self.context_window_with(max_tokens, preserve_system, &CharRatioEstimator::default())
    }

    /// Largest suffix of the history whose estimated cost fits `max_tokens`.
    ///
    /// With `preserve_system`, a system message at position 0 is always kept
    /// and is not charged against the budget.
    pub fn context_window_with(
        &self,
        max_tokens: usize,
        preserve_system: bool,
        estimator: &dyn TokenEstimator,
    ) -> ContextWindow<'_> {
        let (system, rest) = self.split_system(preserve_system);

        let mut used = 0usize;
        let mut start = rest.len();
        for (idx, message) in rest.iter().enumerate().rev() {
            let cost = estimator.estimate(message);
            if used + cost > max_tokens {
                break;
            }
            used += cost;
            start = idx;
        }

        ContextWindow {
            system,
            tail: &rest[start..],
        }
    }

    /// Messages to send under `policy`.
    pub fn select(&self, policy: &ContextPolicy, estimator: &dyn TokenEstimator) -> ContextWindow<'_> {
        match *policy {
            ContextPolicy::Full => ContextWindow {
                system: None,
                tail: &self.messages,
            },
            ContextPolicy::LastMessages(n) => {
                let (system, rest) = self.split_system(true);
                ContextWindow {
                    system,
                    tail: &rest[rest.len().saturating_sub(n)..],
                }
            }
            ContextPolicy::TokenBudget {
                max_tokens,
                preserve_system,
            } => self.context_window_with(max_tokens, preserve_system, estimator),
        }
    }

    fn split_system(&self, preserve_system: bool) -> (Option<&Message>, &[Message]) {
        match self.messages.split_first() {
            Some((first, rest)) if preserve_system && first.role == Role::System => {
                (Some(first), rest)
            }
            _ => (None, &self.messages),
        }
    }

    /// Render the conversation. Pure: the same history always yields the same text.
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&self.messages)?),
            ExportFormat::Messages => Ok(serde_json::to_string_pretty(&self.get_messages())?),
            ExportFormat::Text => Ok(self
                .messages
                .iter()
                .map(|m| format!("{}: {}", m.role.label(), display_text(m)))
                .collect::<Vec<_>>()
                .join("\n")),
            ExportFormat::Markdown => {
                let mut out = format!(
                    "# Conversation {}\n\n**Started:** {}\n**Messages:** {}\n\n",
                    self.id,
                    self.created_at.to_rfc3339(),
                    self.messages.len()
                );
                for m in &self.messages {
                    out.push_str(&format!("### {}\n{}\n\n", m.role.label(), display_text(m)));
                }
                Ok(out)
            }
        }
    }
}

/// Text plus a bracketed note for each tool call or image.
fn display_text(message: &Message) -> String {
    use crate::types::ContentPart;

    let mut pieces = Vec::new();
    for part in message.content.parts() {
        match part {
            ContentPart::Text { text } => pieces.push(text.clone()),
            ContentPart::Image(image) => pieces.push(format!("[image: {}]", image.url)),
            ContentPart::ToolCall(call) => {
                pieces.push(format!("[tool call {}: {}]", call.name, call.arguments_string()))
            }
        }
    }
    pieces.join(" ")
}

/// Output formats for [`Conversation::export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    /// Pretty JSON array of messages with metadata.
    Json,
    /// One `Role: content` line per message.
    Text,
    Markdown,
    /// Pretty JSON array in request-body form.
    Messages,
}

/// How much history to send with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextPolicy {
    #[default]
    Full,
    /// The last `n` messages, plus a leading system message if there is one.
    LastMessages(usize),
    TokenBudget {
        max_tokens: usize,
        preserve_system: bool,
    },
}

/// A borrowed view of the messages selected from a conversation.
#[derive(Debug, Clone, Copy)]
pub struct ContextWindow<'a> {
    system: Option<&'a Message>,
    tail: &'a [Message],
}

impl<'a> ContextWindow<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a Message> + 'a {
        self.system.into_iter().chain(self.tail.iter())
    }

    pub fn len(&self) -> usize {
        self.tail.len() + usize::from(self.system.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn system(&self) -> Option<&'a Message> {
        self.system
    }

    pub fn to_wire(&self) -> Vec<Value> {
        self.iter().map(Message::to_wire).collect()
    }
}

impl<'a> IntoIterator for ContextWindow<'a> {
    type Item = &'a Message;
    type IntoIter = std::iter::Chain<std::option::IntoIter<&'a Message>, std::slice::Iter<'a, Message>>;

    fn into_iter(self) -> Self::IntoIter {
        self.system.into_iter().chain(self.tail.iter())
    }
}
