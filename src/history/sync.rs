//! Best-effort mirroring of local conversations to server-side chats.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use super::store::HistoryStore;
use crate::error::Result;
use crate::types::Role;

/// Remote chat creation, as needed by [`HistoryStore::sync_with_server`].
#[async_trait]
pub trait RemoteChats: Send + Sync {
    /// Create a remote chat and return its id.
    async fn create_chat(&self, module_id: &str, initial_message: &str) -> Result<String>;
}

/// Outcome of a sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Conversations that received a remote id during this pass.
    pub synced_count: usize,
    pub failed: Vec<SyncFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub id: String,
    pub reason: String,
}

/// Remote calls in flight at once.
const SYNC_CONCURRENCY: usize = 4;

impl HistoryStore {
    /// Create a remote chat for every conversation that lacks a remote id.
    ///
    /// Never fails as a whole. Each conversation's failure is recorded in the
    /// report and the conversation is left without a remote id. Nothing is retried.
    pub async fn sync_with_server(&mut self, remote: &dyn RemoteChats, module_id: &str) -> SyncReport {
        let pending: Vec<(String, String)> = self
            .iter()
            .filter(|c| c.remote_id().is_none())
            .map(|c| {
                let initial = c
                    .messages_with_role(Role::User)
                    .next()
                    .map(|m| m.text())
                    .unwrap_or_default();
                (c.id().to_string(), initial)
            })
            .collect();

        let results: Vec<(String, Result<String>)> = stream::iter(pending)
            .map(|(id, initial)| async move {
                let outcome = remote.create_chat(module_id, &initial).await;
                (id, outcome)
            })
            .buffer_unordered(SYNC_CONCURRENCY)
            .collect()
            .await;

        let mut report = SyncReport::default();
        for (id, outcome) in results {
            match outcome {
                Ok(remote_id) if !remote_id.trim().is_empty() => {
                    if let Some(conversation) = self.get_mut(&id) {
                        conversation.set_remote_id(remote_id);
                        report.synced_count += 1;
                    }
                }
                Ok(_) => {
                    warn!(id = %id, "remote chat created without an id");
                    report.failed.push(SyncFailure {
                        id,
                        reason: "server returned an empty chat id".to_string(),
                    });
                }
                Err(err) => {
                    warn!(id = %id, error = %err, "failed to sync conversation");
                    report.failed.push(SyncFailure {
                        id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        report.failed.sort_by(|a, b| a.id.cmp(&b.id));

        info!(
            synced = report.synced_count,
            failed = report.failed.len(),
            "history sync finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelaError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedRemote {
        failing: HashSet<String>,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl RemoteChats for ScriptedRemote {
        async fn create_chat(&self, module_id: &str, initial_message: &str) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((module_id.to_string(), initial_message.to_string()));
            if self.failing.contains(initial_message) {
                return Err(TelaError::api(500, "boom"));
            }
            Ok(format!("remote-{initial_message}"))
        }
    }

    fn store_with(n: usize) -> HistoryStore {
        let mut store = HistoryStore::new();
        for i in 0..n {
            let conv = store.create(Some(&format!("c{i}"))).unwrap();
            conv.append(Role::System, "sys").unwrap();
            conv.append(Role::User, format!("m{i}")).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn partial_failures_are_reported_not_raised() {
        let mut store = store_with(5);
        let remote = ScriptedRemote {
            failing: ["m1", "m3"].iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };

        let report = store.sync_with_server(&remote, "chat").await;

        assert_eq!(report.synced_count, 3);
        let failed: Vec<&str> = report.failed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(failed, vec!["c1", "c3"]);
        assert_eq!(store.get("c0").unwrap().remote_id(), Some("remote-m0"));
        assert_eq!(store.get("c1").unwrap().remote_id(), None);
        assert!(remote
            .seen
            .lock()
            .unwrap()
            .iter()
            .all(|(module, _)| module == "chat"));
    }

    #[tokio::test]
    async fn already_synced_conversations_are_skipped() {
        let mut store = store_with(2);
        store.get_mut("c0").unwrap().set_remote_id("existing");
        store.get_or_create("empty");
        let remote = ScriptedRemote::default();

        let report = store.sync_with_server(&remote, "chat").await;

        assert_eq!(report.synced_count, 2);
        assert!(report.failed.is_empty());
        assert_eq!(store.get("c0").unwrap().remote_id(), Some("existing"));
        assert_eq!(store.get("empty").unwrap().remote_id(), Some("remote-"));
        assert_eq!(remote.seen.lock().unwrap().len(), 2);
    }
}
