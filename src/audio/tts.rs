//! Text-to-speech trait.

use async_trait::async_trait;

use super::types::{SpeechAudio, SpeechRequest};
use crate::error::Result;

/// Trait for text-to-speech backends.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Generate speech audio from text.
    async fn generate_speech(&self, request: &SpeechRequest) -> Result<SpeechAudio>;
}
