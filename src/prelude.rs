//! Convenience re-exports for common use.

pub use crate::client::{ChatRequest, CompletionBackend, TelaClient};
pub use crate::config::TelaConfig;
pub use crate::error::{Result, TelaError};
pub use crate::history::{
    ContextPolicy, Conversation, ExportFormat, HistoryStore, RemoteChats, SyncReport,
};
pub use crate::session::{ChatSession, SendOptions, SendOutcome, StreamingTurn};
pub use crate::types::{
    ChatCompletion, ChatCompletionChunk, ContentPart, FinishReason, GenerationSettings, ImageRef,
    Message, MessageContent, Role, Usage,
};
