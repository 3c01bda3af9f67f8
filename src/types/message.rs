//! Message types for conversation history and request bodies.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{Result, TelaError};

/// A single role-tagged entry in a conversation.
///
/// Messages are created by [`Conversation`](crate::history::Conversation) when
/// appended and are never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub metadata: MessageMetadata,
}

impl Message {
    pub(crate) fn new(
        role: Role,
        content: MessageContent,
        tool_call_id: Option<String>,
        sequence: usize,
        extra: Map<String, Value>,
    ) -> Result<Self> {
        validate(role, &content, tool_call_id.as_deref())?;
        let char_count = content.char_count();
        Ok(Self {
            role,
            content,
            tool_call_id,
            metadata: MessageMetadata {
                timestamp: Utc::now(),
                sequence,
                char_count,
                extra,
            },
        })
    }

    /// Re-check a message that did not come through [`Message::new`].
    pub(crate) fn validate(&self) -> Result<()> {
        validate(self.role, &self.content, self.tool_call_id.as_deref())
    }

    /// Concatenated text content.
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Tool calls requested in this message.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content.tool_calls()
    }

    /// Render as an OpenAI chat-completions message object.
    pub fn to_wire(&self) -> Value {
        let role = self.role.as_ref();

        if self.role == Role::Tool {
            return serde_json::json!({
                "role": role,
                "tool_call_id": self.tool_call_id,
                "content": self.text(),
            });
        }

        let tool_calls = self.tool_calls();
        if !tool_calls.is_empty() {
            let tc_json: Vec<Value> = tool_calls.iter().map(|tc| tc.to_wire()).collect();
            let text = self.text();
            return serde_json::json!({
                "role": role,
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                "tool_calls": tc_json,
            });
        }

        if self.content.is_text_only() {
            return serde_json::json!({ "role": role, "content": self.text() });
        }

        let parts: Vec<Value> = self
            .content
            .parts()
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(serde_json::json!({
                    "type": "text",
                    "text": text,
                })),
                ContentPart::Image(image) => {
                    let mut image_url = serde_json::json!({ "url": image.url });
                    if let Some(ref detail) = image.detail {
                        image_url["detail"] = Value::String(detail.clone());
                    }
                    Some(serde_json::json!({ "type": "image_url", "image_url": image_url }))
                }
                ContentPart::ToolCall(_) => None, // handled above
            })
            .collect();

        serde_json::json!({ "role": role, "content": parts })
    }
}

fn validate(role: Role, content: &MessageContent, tool_call_id: Option<&str>) -> Result<()> {
    match role {
        Role::Tool => {
            if tool_call_id.map_or(true, |id| id.trim().is_empty()) {
                return Err(TelaError::Validation(
                    "Tool messages require a tool_call_id".to_string(),
                ));
            }
        }
        _ => {
            if content.is_blank() {
                return Err(TelaError::Validation(format!(
                    "Content cannot be empty for {role} messages"
                )));
            }
        }
    }
    Ok(())
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Parse a role name, rejecting anything outside the known set.
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| TelaError::Validation(format!("Unknown message role: '{name}'")))
    }

    /// Capitalized label used in human-readable exports.
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
        }
    }
}

/// Per-message bookkeeping recorded at append time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    pub timestamp: DateTime<Utc>,
    /// Zero-based position within the owning conversation.
    pub sequence: usize,
    pub char_count: usize,
    /// Free-form annotations (model, finish reason, usage, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// A single part of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image(ImageRef),
    ToolCall(ToolCall),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Reference to an image, either a remote URL or a `data:` URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ImageRef {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            detail: None,
        }
    }

    /// Embed raw image bytes as a base64 `data:` URL.
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self {
            url: format!("data:{mime_type};base64,{encoded}"),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed arguments, or the raw string when it is not valid JSON.
    pub arguments: Value,
    /// Argument string exactly as the model sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_arguments: Option<String>,
}

impl ToolCall {
    /// Build from the argument string of a response, keeping it verbatim.
    pub fn from_raw(id: impl Into<String>, name: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let arguments = serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw.clone()));
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            raw_arguments: Some(raw),
        }
    }

    /// Argument string as sent on the wire.
    pub fn arguments_string(&self) -> String {
        match (&self.raw_arguments, &self.arguments) {
            (Some(raw), _) => raw.clone(),
            (None, Value::String(raw)) => raw.clone(),
            (None, other) => other.to_string(),
        }
    }

    pub fn to_wire(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "type": "function",
            "function": {
                "name": self.name,
                "arguments": self.arguments_string(),
            }
        })
    }

    fn char_count(&self) -> usize {
        self.name.chars().count() + self.arguments_string().chars().count()
    }
}

/// Ordered content parts of a message.
///
/// A lone text part serializes as a bare string; anything else as an array
/// of tagged parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageContent(Vec<ContentPart>);

impl MessageContent {
    pub fn new(parts: Vec<ContentPart>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[ContentPart] {
        &self.0
    }

    pub fn into_parts(self) -> Vec<ContentPart> {
        self.0
    }

    pub fn push(&mut self, part: ContentPart) {
        self.0.push(part);
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.0
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.0
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when there is nothing but whitespace text.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|part| match part {
            ContentPart::Text { text } => text.trim().is_empty(),
            ContentPart::Image(_) | ContentPart::ToolCall(_) => false,
        })
    }

    pub fn is_text_only(&self) -> bool {
        self.0
            .iter()
            .all(|part| matches!(part, ContentPart::Text { .. }))
    }

    /// Characters counted by the token heuristics. Images count as zero.
    pub fn char_count(&self) -> usize {
        self.0
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.chars().count(),
                ContentPart::Image(_) => 0,
                ContentPart::ToolCall(tc) => tc.char_count(),
            })
            .sum()
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self(vec![ContentPart::text(text)])
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self(vec![ContentPart::Text { text }])
    }
}

impl From<&String> for MessageContent {
    fn from(text: &String) -> Self {
        Self::from(text.as_str())
    }
}

impl From<ContentPart> for MessageContent {
    fn from(part: ContentPart) -> Self {
        Self(vec![part])
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self(parts)
    }
}

impl Serialize for MessageContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [ContentPart::Text { text }] => serializer.serialize_str(text),
            parts => parts.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Parts(Vec<ContentPart>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Self(vec![ContentPart::Text { text }]),
            Repr::Parts(parts) => Self(parts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(role: Role, content: impl Into<MessageContent>) -> Message {
        Message::new(role, content.into(), None, 0, Map::new()).unwrap()
    }

    #[test]
    fn role_parse_accepts_known_names_case_insensitively() {
        assert_eq!(Role::parse("user").unwrap(), Role::User);
        assert_eq!(Role::parse(" Assistant ").unwrap(), Role::Assistant);
        assert!(matches!(
            Role::parse("narrator"),
            Err(TelaError::Validation(msg)) if msg.contains("narrator")
        ));
    }

    #[test]
    fn empty_content_rejected_for_non_tool_roles() {
        let err = Message::new(Role::User, "   ".into(), None, 0, Map::new()).unwrap_err();
        assert!(matches!(err, TelaError::Validation(_)));
    }

    #[test]
    fn tool_message_requires_call_id_but_allows_empty_content() {
        assert!(Message::new(Role::Tool, "".into(), None, 0, Map::new()).is_err());
        let msg = Message::new(Role::Tool, "".into(), Some("call_1".into()), 0, Map::new()).unwrap();
        assert_eq!(
            msg.to_wire(),
            serde_json::json!({"role": "tool", "tool_call_id": "call_1", "content": ""})
        );
    }

    #[test]
    fn text_message_serializes_content_as_string() {
        let msg = message(Role::User, "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"], "hi");
        assert_eq!(json["role"], "user");
        assert_eq!(json["metadata"]["char_count"], 2);
    }

    #[test]
    fn multimodal_content_round_trips_as_tagged_parts() {
        let msg = message(
            Role::User,
            vec![
                ContentPart::text("what is this?"),
                ContentPart::Image(ImageRef::from_url("https://example.com/cat.png")),
            ],
        );
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"image\""));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn image_wire_format_uses_image_url_parts() {
        let msg = message(
            Role::User,
            vec![
                ContentPart::text("describe"),
                ContentPart::Image(ImageRef::from_bytes(b"png", "image/png").with_detail("low")),
            ],
        );
        let wire = msg.to_wire();
        assert_eq!(wire["content"][0]["type"], "text");
        assert_eq!(wire["content"][1]["type"], "image_url");
        assert_eq!(wire["content"][1]["image_url"]["url"], "data:image/png;base64,cG5n");
        assert_eq!(wire["content"][1]["image_url"]["detail"], "low");
    }

    #[test]
    fn assistant_tool_calls_render_as_function_calls() {
        let msg = message(
            Role::Assistant,
            vec![ContentPart::ToolCall(ToolCall {
                id: "call_9".into(),
                name: "get_weather".into(),
                arguments: serde_json::json!({"city": "Oslo"}),
                raw_arguments: None,
            })],
        );
        let wire = msg.to_wire();
        assert_eq!(wire["content"], Value::Null);
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "get_weather");
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], "{\"city\":\"Oslo\"}");
    }

    #[test]
    fn raw_tool_arguments_go_back_on_the_wire_verbatim() {
        for raw in ["\"x\"", "{\"b\": 2, \"a\": 1}", "not json"] {
            let call = ToolCall::from_raw("call_1", "lookup", raw);
            let msg = message(Role::Assistant, vec![ContentPart::ToolCall(call)]);
            assert_eq!(msg.to_wire()["tool_calls"][0]["function"]["arguments"], raw);

            let reloaded: Message =
                serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
            assert_eq!(reloaded.to_wire(), msg.to_wire());
        }

        let call = ToolCall::from_raw("call_2", "lookup", "{\"b\": 2, \"a\": 1}");
        assert_eq!(call.arguments["b"], 2);
    }
}
