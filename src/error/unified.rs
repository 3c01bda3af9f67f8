//! Unified error classification and recovery.

use serde::{Deserialize, Serialize};

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidApiKey,
    InsufficientQuota,
    RateLimitExceeded,
    ModelNotFound,
    InvalidRequest,
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl ErrorCode {
    /// Map a provider `code`/`type` string onto a known code.
    pub fn from_provider(code: &str) -> Self {
        match code {
            "invalid_api_key" | "authentication_error" => Self::InvalidApiKey,
            "insufficient_quota" => Self::InsufficientQuota,
            "rate_limit_exceeded" | "rate_limit_error" => Self::RateLimitExceeded,
            "model_not_found" => Self::ModelNotFound,
            "invalid_request_error" => Self::InvalidRequest,
            "context_length_exceeded" => Self::ContextLengthExceeded,
            "server_error" | "api_error" => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Validation,
    NotFound,
    Persistence,
    Unknown,
}

/// Structured details returned by the API in its `{"error": {...}}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetails {
    pub code: Option<ErrorCode>,
    pub provider_code: Option<String>,
    pub param: Option<String>,
    pub request_id: Option<String>,
}

impl ErrorDetails {
    /// Parse details from an error body. Returns `None` for non-JSON bodies.
    pub fn from_body(body: &str, request_id: Option<String>) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let error = value.get("error")?;
        let provider_code = error
            .get("code")
            .and_then(|c| c.as_str())
            .or_else(|| error.get("type").and_then(|t| t.as_str()))
            .map(ToString::to_string);
        Some(Self {
            code: provider_code.as_deref().map(ErrorCode::from_provider),
            provider_code,
            param: error
                .get("param")
                .and_then(|p| p.as_str())
                .map(ToString::to_string),
            request_id,
        })
    }
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    FixInput,
    CheckIdentifier,
    CheckHistoryFile,
    ContactSupport,
}
