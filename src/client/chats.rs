//! Server-side chat management (`/chats`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::TelaClient;
use crate::error::{Result, TelaError};
use crate::history::RemoteChats;

/// Largest page size the chats endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A chat as stored on the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    pub chat_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub message_count: Option<u64>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// One page of `GET /chats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatPage {
    #[serde(default)]
    pub data: Vec<Chat>,
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub total_pages: u64,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_previous: bool,
}

/// Response of `POST /chats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedChat {
    pub chat_id: String,
}

#[derive(Serialize)]
struct CreateChatBody<'a> {
    module_id: &'a str,
    message: &'a str,
}

fn require_id(chat_id: &str) -> Result<()> {
    if chat_id.trim().is_empty() {
        return Err(TelaError::Validation("chat_id must not be empty".to_string()));
    }
    Ok(())
}

impl TelaClient {
    /// List chats. `page` starts at 1; `page_size` must be within `1..=100`.
    pub async fn list_chats(&self, page: u32, page_size: u32) -> Result<ChatPage> {
        if page < 1 {
            return Err(TelaError::Validation("page must be >= 1".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(TelaError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let query = [("page", page.to_string()), ("page_size", page_size.to_string())];
        self.get_json(&self.url("chats"), &query).await
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<Chat> {
        require_id(chat_id)?;
        let url = self.url_with_segments(&["chats", chat_id])?;
        self.get_json(&url, &[]).await
    }

    /// Create a chat seeded with `message`. Not retried.
    pub async fn create_chat(&self, module_id: &str, message: &str) -> Result<CreatedChat> {
        if module_id.trim().is_empty() {
            return Err(TelaError::Validation("module_id must not be empty".to_string()));
        }
        debug!(module_id, "creating remote chat");
        let body = CreateChatBody { module_id, message };
        self.post_json(&self.url("chats"), &body, false).await
    }

    /// Rename a chat.
    pub async fn update_chat(&self, chat_id: &str, name: &str) -> Result<()> {
        require_id(chat_id)?;
        let url = self.url_with_segments(&["chats", chat_id])?;
        let body = serde_json::json!({ "name": name });
        self.execute(self.http().post(&url).json(&body)).await?;
        Ok(())
    }

    pub async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        require_id(chat_id)?;
        let url = self.url_with_segments(&["chats", chat_id, "delete"])?;
        self.execute(self.http().post(&url)).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteChats for TelaClient {
    async fn create_chat(&self, module_id: &str, initial_message: &str) -> Result<String> {
        let created = TelaClient::create_chat(self, module_id, initial_message).await?;
        Ok(created.chat_id)
    }
}
