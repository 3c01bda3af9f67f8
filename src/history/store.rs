//! In-memory conversation store with JSON file persistence.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::conversation::Conversation;
use super::estimator::{CharRatioEstimator, TokenEstimator};
use crate::config::TelaConfig;
use crate::error::{Result, TelaError};

/// Owns every conversation, keyed by id.
///
/// There is no internal locking: mutation goes through `&mut self`. Share a
/// store across tasks by wrapping it in your own mutex.
pub struct HistoryStore {
    conversations: BTreeMap<String, Conversation>,
    path: Option<PathBuf>,
    estimator: Arc<dyn TokenEstimator>,
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStore")
            .field("conversations", &self.conversations.len())
            .field("path", &self.path)
            .field("estimator", &self.estimator)
            .finish()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate figures computed by [`HistoryStore::get_stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub conversation_count: usize,
    pub total_messages: usize,
    pub total_estimated_tokens: usize,
    pub persistence_path: Option<PathBuf>,
}

impl HistoryStore {
    /// Empty store with no backing file.
    pub fn new() -> Self {
        Self::with_estimator(Arc::new(CharRatioEstimator::default()))
    }

    pub fn with_estimator(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            conversations: BTreeMap::new(),
            path: None,
            estimator,
        }
    }

    /// Store backed by `path`, loading it first if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self::new();
        if path.exists() {
            store.load(&path)?;
        }
        store.path = Some(path);
        Ok(store)
    }

    /// Open the history file named by `config`, falling back to `~/.tela/history.json`.
    pub fn from_config(config: &TelaConfig) -> Result<Self> {
        let path = config.history_path().ok_or_else(|| {
            TelaError::Configuration(
                "no history file configured and no home directory found".to_string(),
            )
        })?;
        debug!(path = %path.display(), "opening history store");
        Self::open(path)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    /// Create a conversation. A missing id gets a fresh UUID.
    ///
    /// Fails with `DuplicateId` if the id is taken; the existing conversation is kept.
    pub fn create(&mut self, id: Option<&str>) -> Result<&mut Conversation> {
        match id {
            Some(id) => self.create_with(id, false),
            None => self.create_with(&uuid::Uuid::new_v4().to_string(), false),
        }
    }

    /// Create a conversation, replacing any existing one when `overwrite` is set.
    pub fn create_with(&mut self, id: &str, overwrite: bool) -> Result<&mut Conversation> {
        validate_conversation_id(id)?;
        debug!(id, overwrite, "creating conversation");
        match self.conversations.entry(id.to_string()) {
            Entry::Vacant(slot) => Ok(slot.insert(Conversation::new(id))),
            Entry::Occupied(mut slot) if overwrite => {
                slot.insert(Conversation::new(id));
                Ok(slot.into_mut())
            }
            Entry::Occupied(_) => Err(TelaError::DuplicateId(id.to_string())),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.get_mut(id)
    }

    /// Existing conversation, or a new empty one registered under `id`.
    pub fn get_or_create(&mut self, id: &str) -> &mut Conversation {
        self.conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id))
    }

    /// Conversation ids in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.conversations.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Remove a conversation. Returns whether it existed; deleting twice is fine.
    pub fn delete(&mut self, id: &str) -> bool {
        self.conversations.remove(id).is_some()
    }

    pub fn clear_all(&mut self) {
        self.conversations.clear();
    }

    /// Write every conversation to `path` atomically (temp file, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.conversations)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path)?;
        if let Err(err) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }

        info!(path = %path.display(), conversations = self.conversations.len(), "saved history");
        Ok(())
    }

    /// Save to the backing path set by [`open`](Self::open) or [`set_path`](Self::set_path).
    pub fn persist(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or_else(|| {
            TelaError::InvalidState("history store has no persistence path".to_string())
        })?;
        self.save(path)
    }

    /// Merge conversations from `path`, replacing any with the same id.
    ///
    /// All-or-nothing: a malformed file yields `Format` and leaves the store as it was.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let parsed: BTreeMap<String, Conversation> = serde_json::from_str(&raw)
            .map_err(|e| TelaError::Format(format!("{}: {e}", path.display())))?;

        for (key, conversation) in &parsed {
            conversation.validate().map_err(|e| {
                TelaError::Format(format!("{}: conversation {key}: {e}", path.display()))
            })?;
        }

        let count = parsed.len();
        for (key, mut conversation) in parsed {
            if conversation.id() != key {
                conversation.set_id(key.clone());
            }
            self.conversations.insert(key, conversation);
        }

        info!(path = %path.display(), conversations = count, "loaded history");
        Ok(count)
    }

    pub fn get_stats(&self) -> HistoryStats {
        let total_messages = self.conversations.values().map(Conversation::len).sum();
        let total_estimated_tokens = self
            .conversations
            .values()
            .flat_map(|c| c.messages())
            .map(|m| self.estimator.estimate(m))
            .sum();
        HistoryStats {
            conversation_count: self.conversations.len(),
            total_messages,
            total_estimated_tokens,
            persistence_path: self.path.clone(),
        }
    }
}

/// Conversation ids must contain something other than whitespace.
pub(crate) fn validate_conversation_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(TelaError::Validation(
            "conversation id must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        TelaError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        ))
    })?;
    let mut tmp_name = name.to_os_string();
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}
