#![cfg(feature = "audio")]

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::test_client;
use tela::audio::{SpeechProvider, SpeechRequest, TranscriptionFormat, TranscriptionRequest};
use tela::error::TelaError;

#[tokio::test]
async fn transcription_uploads_multipart_and_parses_segments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "hello world",
            "language": "en",
            "duration": 1.5,
            "segments": [{"id": 0, "start": 0.0, "end": 1.5, "text": "hello world"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 1);
    let request = TranscriptionRequest::builder()
        .audio(b"RIFF-fake-wav".to_vec())
        .mime_type("audio/wav")
        .language("en")
        .prompt("greetings")
        .build();
    let result = client.transcribe(&request).await.unwrap();

    assert_eq!(result.text, "hello world");
    assert_eq!(result.segment_count(), 1);
    assert_eq!(result.word_count(), 2);

    let received = &server.received_requests().await.unwrap()[0];
    let content_type = received.headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary=tela-"));

    let body = String::from_utf8_lossy(&received.body);
    assert!(body.contains("name=\"model\"\r\n\r\nfabric-voice-stt\r\n"));
    assert!(body.contains("name=\"response_format\"\r\n\r\nverbose_json\r\n"));
    assert!(body.contains("name=\"language\"\r\n\r\nen\r\n"));
    assert!(body.contains("name=\"prompt\"\r\n\r\ngreetings\r\n"));
    assert!(body.contains("filename=\"audio.wav\""));
    assert!(body.contains("RIFF-fake-wav"));
    assert!(!body.contains("name=\"temperature\""));
}

#[tokio::test]
async fn non_json_formats_return_raw_text() {
    let server = MockServer::start().await;
    let srt = "1\n00:00:00,000 --> 00:00:01,000\nhi\n\n";
    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(srt))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 1);
    let request = TranscriptionRequest::builder()
        .audio(vec![0, 1, 2])
        .mime_type("audio/mpeg")
        .response_format(TranscriptionFormat::Srt)
        .build();
    let result = client.transcribe(&request).await.unwrap();
    assert_eq!(result.text, srt);
    assert!(result.segments.is_empty());
}

#[tokio::test]
async fn unsupported_mime_type_is_rejected_locally() {
    let server = MockServer::start().await;
    let client = test_client(&server.uri(), 1);
    let request = TranscriptionRequest::builder()
        .audio(vec![1])
        .mime_type("image/png")
        .build();
    assert!(matches!(
        client.transcribe(&request).await.unwrap_err(),
        TelaError::Validation(_)
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn transcribe_file_reads_and_detects_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "from disk"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("memo.flac");
    std::fs::write(&file, b"fLaC").unwrap();

    let client = test_client(&server.uri(), 1);
    let result = client.transcribe_file(&file, Some("de")).await.unwrap();
    assert_eq!(result.text, "from disk");

    let body = String::from_utf8_lossy(&server.received_requests().await.unwrap()[0].body).to_string();
    assert!(body.contains("filename=\"audio.flac\""));
    assert!(body.contains("Content-Type: audio/flac"));
}

#[tokio::test]
async fn speech_returns_audio_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(body_json(json!({
            "model": "fabric-voice-tts",
            "input": "Hello",
            "voice": "aria",
            "output_format": "opus_48000_128"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/ogg; codecs=opus")
                .set_body_bytes(vec![1u8, 2, 3, 4]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 1);
    let request = SpeechRequest::builder().text("Hello").voice("aria").build();
    let audio = SpeechProvider::generate_speech(&client, &request).await.unwrap();

    assert_eq!(audio.bytes, vec![1, 2, 3, 4]);
    assert_eq!(audio.content_type, "audio/ogg");

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("hello.ogg");
    audio.write_to(&out).await.unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn speech_json_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"error": {"message": "voice not found"}})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 1);
    let request = SpeechRequest::builder().text("Hello").voice("nobody").build();
    match client.generate_speech(&request).await.unwrap_err() {
        TelaError::Api { status, message, .. } => {
            assert_eq!(status, 502);
            assert_eq!(message, "voice not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn voices_are_listed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/audio/voices"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "aria", "name": "Aria", "language_code": "en-US"}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 1);
    let voices = client.list_voices().await.unwrap();
    assert_eq!(voices.data.len(), 1);
    assert_eq!(voices.data[0].name, "Aria");
    assert_eq!(voices.data[0].language_code.as_deref(), Some("en-US"));
}
