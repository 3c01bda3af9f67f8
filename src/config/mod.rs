//! Configuration system (layered: code > env > config file).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TelaError};

pub const DEFAULT_BASE_URL: &str = "https://api.telaos.com/v1";
pub const DEFAULT_MODEL: &str = "wizard";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_HISTORY_FILE: &str = "history.json";

pub const ENV_API_KEY: &str = "TELAOS_API_KEY";
pub const ENV_ORG_ID: &str = "TELAOS_ORG_ID";
pub const ENV_PROJECT_ID: &str = "TELAOS_PROJECT_ID";
pub const ENV_BASE_URL: &str = "TELA_BASE_URL";
pub const ENV_TIMEOUT: &str = "TELA_TIMEOUT";
pub const ENV_MAX_RETRIES: &str = "TELA_MAX_RETRIES";
pub const ENV_MODEL: &str = "TELA_MODEL";
pub const ENV_HISTORY_FILE: &str = "TELA_HISTORY_FILE";

/// Client configuration.
///
/// Nothing here is global: build one, then hand it to
/// [`TelaClient::new`](crate::client::TelaClient::new).
///
/// Resolution order, highest first:
/// 1. Values set with the `with_*` methods
/// 2. Environment variables (`TELAOS_API_KEY`, `TELA_BASE_URL`, ...)
/// 3. `~/.tela/config.toml`
#[derive(Clone, PartialEq)]
pub struct TelaConfig {
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub default_model: String,
    pub history_file: Option<PathBuf>,
    pub default_headers: BTreeMap<String, String>,
}

impl std::fmt::Debug for TelaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelaConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("default_model", &self.default_model)
            .field("history_file", &self.history_file)
            .field("default_headers", &self.default_headers)
            .finish()
    }
}

impl Default for TelaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            organization: None,
            project: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            default_model: DEFAULT_MODEL.to_string(),
            history_file: None,
            default_headers: BTreeMap::new(),
        }
    }
}

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_key: Option<String>,
    organization: Option<String>,
    project: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<f64>,
    max_retries: Option<u32>,
    default_model: Option<String>,
    history_file: Option<PathBuf>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl TelaConfig {
    /// Config with explicit credentials and defaults for everything else.
    pub fn new(
        api_key: impl Into<String>,
        organization: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self::default()
            .with_api_key(api_key)
            .with_organization(organization)
            .with_project(project)
    }

    /// Load `~/.tela/config.toml` (if present), then `.env`, then the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let base = match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        base.apply_env(|key| std::env::var(key).ok())
    }

    /// Parse a TOML config file on top of the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&raw).map_err(|e| {
            TelaError::Configuration(format!("invalid config file {}: {e}", path.display()))
        })?;

        let mut config = Self::default();
        config.api_key = file.api_key.or(config.api_key);
        config.organization = file.organization.or(config.organization);
        config.project = file.project.or(config.project);
        if let Some(url) = file.base_url {
            config.base_url = url;
        }
        if let Some(secs) = file.timeout_secs {
            config.timeout = seconds_to_duration(secs, "timeout_secs")?;
        }
        if let Some(retries) = file.max_retries {
            config.max_retries = retries;
        }
        if let Some(model) = file.default_model {
            config.default_model = model;
        }
        config.history_file = file.history_file;
        config.default_headers = file.headers;
        Ok(config)
    }

    /// Overlay values found through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(org) = get(ENV_ORG_ID) {
            self.organization = Some(org);
        }
        if let Some(project) = get(ENV_PROJECT_ID) {
            self.project = Some(project);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = get(ENV_TIMEOUT) {
            let secs: f64 = raw.trim().parse().map_err(|_| {
                TelaError::Configuration(format!("{ENV_TIMEOUT} is not a number: '{raw}'"))
            })?;
            self.timeout = seconds_to_duration(secs, ENV_TIMEOUT)?;
        }
        if let Some(raw) = get(ENV_MAX_RETRIES) {
            self.max_retries = raw.trim().parse().map_err(|_| {
                TelaError::Configuration(format!(
                    "{ENV_MAX_RETRIES} is not a non-negative integer: '{raw}'"
                ))
            })?;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.default_model = model;
        }
        if let Some(path) = get(ENV_HISTORY_FILE) {
            self.history_file = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = Some(path.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Configured history file, or `~/.tela/history.json`.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file
            .clone()
            .or_else(|| default_tela_dir().map(|dir| dir.join(DEFAULT_HISTORY_FILE)))
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Check that credentials are present and values are usable.
    pub fn validate(&self) -> Result<()> {
        let missing = [
            (ENV_API_KEY, &self.api_key),
            (ENV_ORG_ID, &self.organization),
            (ENV_PROJECT_ID, &self.project),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(TelaError::Authentication(format!(
                "missing credentials; set {}",
                missing.join(", ")
            )));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(TelaError::Configuration(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(TelaError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// `~/.tela/config.toml`, when a home directory can be resolved.
pub fn default_config_path() -> Option<PathBuf> {
    default_tela_dir().map(|dir| dir.join("config.toml"))
}

/// `~/.tela`, the directory holding config and default history.
pub fn default_tela_dir() -> Option<PathBuf> {
    directories::UserDirs::new().map(|dirs| dirs.home_dir().join(".tela"))
}

fn seconds_to_duration(secs: f64, field: &str) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(TelaError::Configuration(format!(
            "{field} must be a positive number of seconds, got {secs}"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}
