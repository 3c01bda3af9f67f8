//! Tela audio endpoints on [`TelaClient`].

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::helpers::{build_multipart, mime_for_path, normalize_mime_type, transcription_extension_for_mime, FilePart};
use super::transcription::AudioProvider;
use super::tts::SpeechProvider;
use super::types::{
    SpeechAudio, SpeechRequest, TranscriptionRequest, TranscriptionResult, VoiceList,
    DEFAULT_SPEECH_CONTENT_TYPE, DEFAULT_SPEECH_MODEL, DEFAULT_SPEECH_OUTPUT_FORMAT,
    DEFAULT_TRANSCRIPTION_MODEL,
};
use crate::client::{http, TelaClient};
use crate::error::{Result, TelaError};

impl TelaClient {
    /// `POST /audio/transcriptions` (multipart), retried on transient failures.
    pub async fn transcribe(&self, request: &TranscriptionRequest) -> Result<TranscriptionResult> {
        let mime_type = validate_transcription(request)?;
        let extension = transcription_extension_for_mime(&mime_type).ok_or_else(|| {
            TelaError::Validation(format!("Unsupported transcription MIME type: {mime_type}"))
        })?;
        let fields = transcription_fields(request);
        let url = self.url("audio/transcriptions");
        debug!(bytes = request.audio.len(), mime_type = %mime_type, "transcribe");

        self.retry_policy()
            .execute(|| async {
                let boundary = format!("tela-{}", Uuid::new_v4().simple());
                let body = build_multipart(
                    &boundary,
                    &fields,
                    FilePart {
                        bytes: &request.audio,
                        mime_type: &mime_type,
                        extension,
                    },
                );
                let content_type = HeaderValue::from_str(&format!("multipart/form-data; boundary={boundary}"))
                    .map_err(|e| TelaError::Validation(format!("Failed to build multipart content-type: {e}")))?;

                let resp = self
                    .execute(self.http().post(&url).header(CONTENT_TYPE, content_type).body(body))
                    .await?;
                parse_transcription(resp, request, self.timeout_ms()).await
            })
            .await
    }

    /// Read an audio file and transcribe it, inferring the MIME type from its extension.
    pub async fn transcribe_file(
        &self,
        path: impl AsRef<Path>,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        let path = path.as_ref();
        let mime_type = mime_for_path(path).ok_or_else(|| {
            TelaError::Validation(format!("Cannot infer audio type of {}", path.display()))
        })?;
        let audio = tokio::fs::read(path).await?;
        let request = TranscriptionRequest::builder()
            .audio(audio)
            .mime_type(mime_type)
            .maybe_language(language)
            .build();
        self.transcribe(&request).await
    }

    /// `POST /audio/speech`, returning the raw audio bytes.
    pub async fn generate_speech(&self, request: &SpeechRequest) -> Result<SpeechAudio> {
        validate_speech(request)?;
        let payload = speech_payload(request);
        let url = self.url("audio/speech");
        debug!(chars = request.text.chars().count(), voice = %request.voice, "generate speech");

        self.retry_policy()
            .execute(|| async {
                let resp = self.execute(self.http().post(&url).json(&payload)).await?;
                parse_speech(resp, self.timeout_ms()).await
            })
            .await
    }

    /// `GET /audio/voices`.
    pub async fn list_voices(&self) -> Result<VoiceList> {
        self.get_json(&self.url("audio/voices"), &[]).await
    }
}

#[async_trait]
impl AudioProvider for TelaClient {
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<TranscriptionResult> {
        TelaClient::transcribe(self, request).await
    }
}

#[async_trait]
impl SpeechProvider for TelaClient {
    async fn generate_speech(&self, request: &SpeechRequest) -> Result<SpeechAudio> {
        TelaClient::generate_speech(self, request).await
    }
}

fn validate_transcription(request: &TranscriptionRequest) -> Result<String> {
    if request.audio.is_empty() {
        return Err(TelaError::Validation(
            "Audio payload cannot be empty".to_string(),
        ));
    }
    let mime = normalize_mime_type(&request.mime_type)
        .ok_or_else(|| TelaError::Validation("MIME type cannot be empty".to_string()))?;
    if let Some(ref lang) = request.language {
        if lang.trim().is_empty() {
            return Err(TelaError::Validation(
                "Language hint cannot be empty".to_string(),
            ));
        }
    }
    if let Some(temp) = request.temperature {
        if !temp.is_finite() || !(0.0..=1.0).contains(&temp) {
            return Err(TelaError::Validation(
                "Transcription temperature must be between 0.0 and 1.0".to_string(),
            ));
        }
    }
    Ok(mime.to_ascii_lowercase())
}

fn transcription_fields(request: &TranscriptionRequest) -> Vec<(&'static str, String)> {
    let model = request
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string());
    let mut fields = vec![
        ("model", model),
        ("response_format", request.response_format.to_string()),
    ];
    if let Some(ref lang) = request.language {
        fields.push(("language", lang.trim().to_string()));
    }
    if let Some(ref prompt) = request.prompt {
        fields.push(("prompt", prompt.clone()));
    }
    if let Some(temp) = request.temperature.filter(|t| *t != 0.0) {
        fields.push(("temperature", temp.to_string()));
    }
    fields
}

async fn parse_transcription(
    resp: reqwest::Response,
    request: &TranscriptionRequest,
    timeout_ms: u64,
) -> Result<TranscriptionResult> {
    if request.response_format.is_json() {
        let result: TranscriptionResult = http::read_json(resp, timeout_ms).await?;
        return Ok(result);
    }
    let text = resp
        .text()
        .await
        .map_err(|e| http::map_transport_error(e, timeout_ms))?;
    Ok(TranscriptionResult {
        text,
        language: request.language.clone(),
        ..Default::default()
    })
}

fn validate_speech(request: &SpeechRequest) -> Result<()> {
    if request.text.trim().is_empty() {
        return Err(TelaError::Validation(
            "Speech text cannot be empty".to_string(),
        ));
    }
    if request.voice.trim().is_empty() {
        return Err(TelaError::Validation("Voice id cannot be empty".to_string()));
    }
    if let Some(speed) = request.speed {
        if !speed.is_finite() || !(0.25..=4.0).contains(&speed) {
            return Err(TelaError::Validation(
                "Speech speed must be between 0.25 and 4.0".to_string(),
            ));
        }
    }
    Ok(())
}

fn speech_payload(request: &SpeechRequest) -> Value {
    let mut obj = Map::new();
    obj.insert(
        "model".into(),
        request
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string())
            .into(),
    );
    obj.insert("input".into(), request.text.clone().into());
    obj.insert("voice".into(), request.voice.clone().into());
    obj.insert(
        "output_format".into(),
        request
            .output_format
            .clone()
            .unwrap_or_else(|| DEFAULT_SPEECH_OUTPUT_FORMAT.to_string())
            .into(),
    );
    if let Some(ref format) = request.response_format {
        obj.insert("response_format".into(), format.clone().into());
    }
    if let Some(speed) = request.speed {
        obj.insert("speed".into(), speed.into());
    }
    Value::Object(obj)
}

async fn parse_speech(resp: reqwest::Response, timeout_ms: u64) -> Result<SpeechAudio> {
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_SPEECH_CONTENT_TYPE.to_string());

    if content_type == "application/json" {
        let headers = resp.headers().clone();
        let body = resp
            .text()
            .await
            .map_err(|e| http::map_transport_error(e, timeout_ms))?;
        // A JSON body on a 2xx is the server reporting a failure.
        return Err(http::status_to_error(502, &body, &headers));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| http::map_transport_error(e, timeout_ms))?;
    if bytes.is_empty() {
        return Err(TelaError::InvalidState(
            "Speech response contained empty audio payload".to_string(),
        ));
    }
    Ok(SpeechAudio {
        bytes: bytes.to_vec(),
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TranscriptionFormat;

    #[test]
    fn transcription_fields_skip_zero_temperature() {
        let request = TranscriptionRequest::builder()
            .audio(vec![1])
            .mime_type("audio/wav")
            .language(" en ")
            .temperature(0.0)
            .build();
        let fields = transcription_fields(&request);
        assert_eq!(
            fields,
            vec![
                ("model", "fabric-voice-stt".to_string()),
                ("response_format", "verbose_json".to_string()),
                ("language", "en".to_string()),
            ]
        );
    }

    #[test]
    fn transcription_validation() {
        let empty = TranscriptionRequest::builder().audio(vec![]).mime_type("audio/wav").build();
        assert!(matches!(validate_transcription(&empty), Err(TelaError::Validation(_))));

        let hot = TranscriptionRequest::builder()
            .audio(vec![1])
            .mime_type("audio/wav")
            .temperature(1.5)
            .response_format(TranscriptionFormat::Text)
            .build();
        assert!(validate_transcription(&hot).is_err());

        let ok = TranscriptionRequest::builder().audio(vec![1]).mime_type("Audio/WAV; x=1").build();
        assert_eq!(validate_transcription(&ok).unwrap(), "audio/wav");
    }

    #[test]
    fn speech_payload_fills_defaults() {
        let request = SpeechRequest::builder().text("hi").voice("v1").speed(1.5).build();
        validate_speech(&request).unwrap();
        assert_eq!(
            speech_payload(&request),
            serde_json::json!({
                "model": "fabric-voice-tts",
                "input": "hi",
                "voice": "v1",
                "output_format": "opus_48000_128",
                "speed": 1.5,
            })
        );
        let too_fast = SpeechRequest::builder().text("hi").voice("v1").speed(9.0).build();
        assert!(validate_speech(&too_fast).is_err());
    }
}
