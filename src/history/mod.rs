//! Conversation history: messages grouped into conversations, held in a store.
//!
//! ```no_run
//! use tela::history::{ExportFormat, HistoryStore};
//! use tela::types::Role;
//!
//! let mut store = HistoryStore::open("history.json")?;
//! let conv = store.get_or_create("support");
//! conv.append(Role::User, "hi")?;
//! conv.append(Role::Assistant, "hello")?;
//! println!("{}", conv.export(ExportFormat::Markdown)?);
//! store.persist()?;
//! # Ok::<(), tela::TelaError>(())
//! ```

pub mod conversation;
pub mod estimator;
pub mod store;
pub mod sync;

pub use conversation::{ContextPolicy, ContextWindow, Conversation, ExportFormat};
pub use estimator::{CharRatioEstimator, TokenEstimator};
pub use store::{HistoryStats, HistoryStore};
pub(crate) use store::validate_conversation_id;
pub use sync::{RemoteChats, SyncFailure, SyncReport};
