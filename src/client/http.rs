//! HTTP client construction, status mapping, and SSE parsing.

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::config::TelaConfig;
use crate::error::{ErrorDetails, Result, TelaError};

pub const ORGANIZATION_HEADER: &str = "openai-organization";
pub const PROJECT_HEADER: &str = "openai-project";

/// Default `User-Agent` sent with every request.
pub fn user_agent() -> String {
    format!("tela-rs/{}", env!("CARGO_PKG_VERSION"))
}

/// Headers attached to every request: bearer auth, org/project, user agent, extras.
pub fn default_headers(config: &TelaConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(ref key) = config.api_key {
        let mut value = header_value("Authorization", &format!("Bearer {key}"))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    if let Some(ref org) = config.organization {
        headers.insert(ORGANIZATION_HEADER, header_value(ORGANIZATION_HEADER, org)?);
    }
    if let Some(ref project) = config.project {
        headers.insert(PROJECT_HEADER, header_value(PROJECT_HEADER, project)?);
    }
    headers.insert(USER_AGENT, header_value("User-Agent", &user_agent())?);

    for (name, value) in &config.default_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TelaError::Configuration(format!("invalid header name '{name}'")))?;
        let value = header_value(name.as_str(), value)?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| TelaError::Configuration(format!("invalid value for header {name}")))
}

/// Build a per-client `reqwest::Client` with the configured timeout and headers.
pub fn build_client(config: &TelaConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .default_headers(default_headers(config)?)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| TelaError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Map a transport error, turning elapsed deadlines into [`TelaError::Timeout`].
pub fn map_transport_error(err: reqwest::Error, timeout_ms: u64) -> TelaError {
    if err.is_timeout() {
        TelaError::Timeout(timeout_ms)
    } else {
        TelaError::Network(err)
    }
}

/// Parse an SSE "data:" line, returning None for "[DONE]" and non-data lines.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Map a non-success HTTP response to an error.
pub fn status_to_error(status: u16, body: &str, headers: &HeaderMap) -> TelaError {
    let message = error_message(body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            body.to_string()
        }
    });

    match status {
        401 | 403 => TelaError::Authentication(message),
        404 => TelaError::NotFound(message),
        429 => TelaError::RateLimited {
            retry_after_ms: retry_after_header(headers).or_else(|| retry_after_body(body)),
        },
        _ => {
            let request_id = headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            TelaError::api_with_details(
                status,
                message,
                body,
                ErrorDetails::from_body(body, request_id),
            )
        }
    }
}

/// Pull `error.message` (or a top-level `message`/`detail`) from a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .or_else(|| value.get("message"))
        .or_else(|| value.get("detail"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn retry_after_header(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| (s * 1000.0) as u64)
}

fn retry_after_body(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// Return the response if successful, otherwise read the body and map the status.
pub async fn check_response(resp: reqwest::Response, timeout_ms: u64) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let headers = resp.headers().clone();
    let body = resp
        .text()
        .await
        .map_err(|e| map_transport_error(e, timeout_ms))?;
    Err(status_to_error(status.as_u16(), &body, &headers))
}

/// Decode a successful response body as JSON.
pub async fn read_json<T: DeserializeOwned>(resp: reqwest::Response, timeout_ms: u64) -> Result<T> {
    let text = resp
        .text()
        .await
        .map_err(|e| map_transport_error(e, timeout_ms))?;
    Ok(serde_json::from_str(&text)?)
}

/// Turn an SSE response body into a stream of decoded `data:` payloads.
///
/// Ends at `data: [DONE]` or when the body closes. A payload carrying an
/// `error` object is surfaced as an API error and ends the stream.
pub fn sse_stream<T>(resp: reqwest::Response, timeout_ms: u64) -> BoxStream<'static, Result<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let bytes = resp
        .bytes_stream()
        .map(move |chunk| chunk.map_err(|e| map_transport_error(e, timeout_ms)));
    decode_sse(bytes)
}

/// Decode SSE events from raw body chunks.
///
/// Lines are split on raw bytes and decoded only once complete, so a
/// multi-byte character may straddle chunk boundaries. A final line without
/// a trailing newline is still decoded when the body closes.
pub(crate) fn decode_sse<T, S, B>(bytes: S) -> BoxStream<'static, Result<T>>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        futures::pin_mut!(bytes);

        loop {
            let closed = match bytes.next().await {
                Some(Ok(chunk)) => {
                    buffer.extend_from_slice(chunk.as_ref());
                    false
                }
                Some(Err(err)) => {
                    yield Err(err);
                    return;
                }
                None => true,
            };

            let mut lines: Vec<Vec<u8>> = Vec::new();
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                lines.push(buffer.drain(..=pos).collect());
            }
            if closed && !buffer.is_empty() {
                lines.push(std::mem::take(&mut buffer));
            }

            for line in lines {
                match decode_line::<T>(&line) {
                    SseLine::Skip => {}
                    SseLine::Done => return,
                    SseLine::Item(item) => yield Ok(item),
                    SseLine::Fail(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }

            if closed {
                return;
            }
        }
    };

    Box::pin(stream)
}

enum SseLine<T> {
    Skip,
    Done,
    Item(T),
    Fail(TelaError),
}

fn decode_line<T: DeserializeOwned>(raw: &[u8]) -> SseLine<T> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim(),
        Err(e) => return SseLine::Fail(TelaError::Stream(format!("invalid UTF-8 in event stream: {e}"))),
    };
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }
    if line.strip_prefix("data:").map(str::trim) == Some("[DONE]") {
        return SseLine::Done;
    }
    let Some(data) = parse_sse_data(line) else {
        return SseLine::Skip;
    };

    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(value) if value.get("error").is_some() => {
            SseLine::Fail(status_to_error(500, data, &HeaderMap::new()))
        }
        Ok(value) => match serde_json::from_value::<T>(value) {
            Ok(item) => SseLine::Item(item),
            Err(e) => SseLine::Fail(TelaError::Stream(format!("malformed chunk: {e}"))),
        },
        Err(e) => SseLine::Fail(TelaError::Stream(format!("malformed chunk: {e}"))),
    }
}
