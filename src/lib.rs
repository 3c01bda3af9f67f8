//! Tela: Rust client for the Tela chat API.
//!
//! Wraps an OpenAI-compatible chat-completions service and adds conversation
//! history on top: an in-memory store with JSON persistence, token-budgeted
//! context windows, exports, and best-effort server-side chat sync. Audio
//! transcription and text-to-speech are exposed as thin passthroughs.
//!
//! # Quick Start
//!
//! ```no_run
//! use tela::prelude::*;
//!
//! # async fn example() -> tela::error::Result<()> {
//! let client = TelaClient::from_env()?;
//! let session = ChatSession::from_client(client);
//! let mut store = HistoryStore::open("history.json")?;
//!
//! let outcome = session
//!     .send_message(&mut store, Some("support"), "Hello!", &SendOptions::default())
//!     .await?;
//! println!("{}", outcome.text());
//! store.persist()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod prelude;
pub mod session;
pub mod types;
pub mod util;

#[cfg(feature = "audio")]
pub mod audio;

pub use client::TelaClient;
pub use config::TelaConfig;
pub use error::{Result, TelaError};
