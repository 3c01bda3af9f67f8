//! HTTP client for the Tela API.

pub mod chat;
pub mod chats;
pub mod http;
pub mod models;

pub use chat::{ChatRequest, CompletionBackend};
pub use chats::{Chat, ChatPage, CreatedChat};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::TelaConfig;
use crate::error::{Result, TelaError};
use crate::util::retry::RetryPolicy;

/// Client for the chat, model, chat-management, and audio endpoints.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct TelaClient {
    config: TelaConfig,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl TelaClient {
    /// Validate `config` and build a client from it.
    pub fn new(config: TelaConfig) -> Result<Self> {
        config.validate()?;
        let http = http::build_client(&config)?;
        let retry = RetryPolicy::from_max_retries(config.max_retries);
        Ok(Self {
            config,
            http,
            retry,
        })
    }

    /// Build from `~/.tela/config.toml`, `.env`, and the process environment.
    pub fn from_env() -> Result<Self> {
        Self::new(TelaConfig::from_env()?)
    }

    /// Replace the retry policy derived from `max_retries`.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn config(&self) -> &TelaConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url(), path.trim_start_matches('/'))
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub(crate) fn url_with_segments(&self, segments: &[&str]) -> Result<String> {
        let mut url = reqwest::Url::parse(self.config.base_url())
            .map_err(|e| TelaError::Configuration(format!("invalid base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| TelaError::Configuration("base_url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    pub(crate) fn timeout_ms(&self) -> u64 {
        self.config.timeout.as_millis() as u64
    }

    /// Send a request and map transport failures and error statuses.
    pub(crate) async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let timeout_ms = self.timeout_ms();
        let resp = request
            .send()
            .await
            .map_err(|e| http::map_transport_error(e, timeout_ms))?;
        http::check_response(resp, timeout_ms).await
    }

    /// Idempotent `GET` returning JSON, retried per the client policy.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!(%url, "GET");
        self.retry
            .execute(|| async {
                let resp = self.execute(self.http.get(url).query(query)).await?;
                http::read_json(resp, self.timeout_ms()).await
            })
            .await
    }

    /// `POST` a JSON body and decode a JSON response. Retried only when `retry` is set.
    pub(crate) async fn post_json<B, T>(&self, url: &str, body: &B, retry: bool) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%url, retry, "POST");
        let attempt = || async {
            let resp = self.execute(self.http.post(url).json(body)).await?;
            http::read_json(resp, self.timeout_ms()).await
        };
        if retry {
            self.retry.execute(attempt).await
        } else {
            attempt().await
        }
    }
}
