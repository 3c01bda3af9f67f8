//! Audio request and response types.

use std::path::Path;

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::error::Result;

pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "fabric-voice-stt";
pub const DEFAULT_SPEECH_MODEL: &str = "fabric-voice-tts";
pub const DEFAULT_SPEECH_OUTPUT_FORMAT: &str = "opus_48000_128";
pub const DEFAULT_SPEECH_CONTENT_TYPE: &str = "audio/opus";

/// Response format for `/audio/transcriptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TranscriptionFormat {
    Json,
    #[default]
    VerboseJson,
    Text,
    Srt,
    Vtt,
}

impl TranscriptionFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::VerboseJson)
    }
}

/// Audio to transcribe plus request options.
#[derive(Debug, Clone, Builder)]
pub struct TranscriptionRequest {
    pub audio: Vec<u8>,
    #[builder(into)]
    pub mime_type: String,
    #[builder(into)]
    pub model: Option<String>,
    #[builder(into)]
    pub language: Option<String>,
    /// Text to guide style or vocabulary.
    #[builder(into)]
    pub prompt: Option<String>,
    #[builder(default)]
    pub response_format: TranscriptionFormat,
    /// Sampling temperature in `0.0..=1.0`; zero is the server default and is not sent.
    pub temperature: Option<f64>,
}

/// A timed slice of a transcription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionSegment {
    #[serde(default)]
    pub id: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Transcribed text, with timing when the server provided it.
///
/// For `text`, `srt`, and `vtt` formats `text` holds the raw response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TranscriptionResult {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub segments: Vec<TranscriptionSegment>,
}

impl TranscriptionResult {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// One `[start - end] text` line per segment, or the plain text without segments.
    pub fn text_with_timestamps(&self) -> String {
        if self.segments.is_empty() {
            return self.text.clone();
        }
        self.segments
            .iter()
            .map(|s| format!("[{:.2}s - {:.2}s] {}", s.start, s.end, s.text.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                segment.id + 1,
                timestamp(segment.start, ','),
                timestamp(segment.end, ','),
                segment.text.trim()
            ));
        }
        out
    }

    pub fn to_vtt(&self) -> String {
        let mut out = String::from("WEBVTT\n\n");
        for segment in &self.segments {
            out.push_str(&format!(
                "{} --> {}\n{}\n\n",
                timestamp(segment.start, '.'),
                timestamp(segment.end, '.'),
                segment.text.trim()
            ));
        }
        out
    }
}

/// `HH:MM:SS<sep>mmm`
fn timestamp(seconds: f64, millis_separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02}{millis_separator}{millis:03}")
}

/// Text-to-speech request.
#[derive(Debug, Clone, Builder)]
pub struct SpeechRequest {
    #[builder(into)]
    pub text: String,
    #[builder(into)]
    pub voice: String,
    #[builder(into)]
    pub model: Option<String>,
    /// Provider codec string, e.g. `opus_48000_128`.
    #[builder(into)]
    pub output_format: Option<String>,
    #[builder(into)]
    pub response_format: Option<String>,
    /// Playback speed in `0.25..=4.0`.
    pub speed: Option<f64>,
}

/// Generated audio bytes and their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechAudio {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl SpeechAudio {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        tokio::fs::write(path, &self.bytes).await?;
        Ok(())
    }
}

/// A voice offered by `/audio/voices`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Voice {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub settings: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VoiceList {
    #[serde(default)]
    pub data: Vec<Voice>,
    #[serde(default)]
    pub object: Option<String>,
}
