//! Core types for Tela.

pub mod completion;
pub mod generation;
pub mod message;
pub mod models;
pub mod stream;
pub mod usage;

pub use completion::*;
pub use generation::*;
pub use message::*;
pub use models::*;
pub use stream::*;
pub use usage::*;
