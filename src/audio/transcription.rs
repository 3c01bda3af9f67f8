//! Audio transcription trait.

use async_trait::async_trait;

use super::types::{TranscriptionRequest, TranscriptionResult};
use crate::error::Result;

/// Trait for speech-to-text backends.
#[async_trait]
pub trait AudioProvider: Send + Sync {
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<TranscriptionResult>;
}
