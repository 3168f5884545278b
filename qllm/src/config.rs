//! Runtime knobs read from the environment.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use qprovider::DEFAULT_STREAM_PACING;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

pub const REQUEST_TIMEOUT_VAR: &str = "QLLM_REQUEST_TIMEOUT_SECS";
pub const DEADLINE_VAR: &str = "QLLM_DEADLINE_SECS";
pub const STREAM_PACING_VAR: &str = "QLLM_STREAM_PACING_MS";
pub const OPENAI_BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const ANTHROPIC_BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";
pub const GOOGLE_BASE_URL_VAR: &str = "GOOGLE_BASE_URL";
/// Server root of a local Ollama install, e.g. `http://localhost:11434`.
pub const OLLAMA_BASE_URL_VAR: &str = "OLLAMA_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: String,
    pub message: String,
}

impl ConfigError {
    fn invalid(variable: &str, message: impl Into<String>) -> Self {
        Self {
            variable: variable.to_string(),
            message: message.into(),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.variable, self.message)
    }
}

impl Error for ConfigError {}

/// Settings shared by every HTTP-backed provider. Credentials live in
/// [`CredentialStore`](qprovider::CredentialStore), not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QllmConfig {
    pub request_timeout: Duration,
    /// Per-call deadline handed to each adapter; `None` waits indefinitely.
    pub deadline: Option<Duration>,
    /// Delay between chunks of emulated streams.
    pub stream_pacing: Duration,
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub google_base_url: Option<String>,
    pub ollama_base_url: Option<String>,
}

impl Default for QllmConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            deadline: None,
            stream_pacing: DEFAULT_STREAM_PACING,
            openai_base_url: None,
            anthropic_base_url: None,
            google_base_url: None,
            ollama_base_url: None,
        }
    }
}

impl QllmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from `lookup`; unset and blank values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(seconds) = value(REQUEST_TIMEOUT_VAR) {
            config.request_timeout = Duration::from_secs(parse_positive(REQUEST_TIMEOUT_VAR, &seconds)?);
        }
        if let Some(seconds) = value(DEADLINE_VAR) {
            config.deadline = Some(Duration::from_secs(parse_positive(DEADLINE_VAR, &seconds)?));
        }
        if let Some(millis) = value(STREAM_PACING_VAR) {
            let millis = millis
                .parse::<u64>()
                .map_err(|err| ConfigError::invalid(STREAM_PACING_VAR, err.to_string()))?;
            config.stream_pacing = Duration::from_millis(millis);
        }

        config.openai_base_url = value(OPENAI_BASE_URL_VAR);
        config.anthropic_base_url = value(ANTHROPIC_BASE_URL_VAR);
        config.google_base_url = value(GOOGLE_BASE_URL_VAR);
        config.ollama_base_url = value(OLLAMA_BASE_URL_VAR);

        Ok(config)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_stream_pacing(mut self, pacing: Duration) -> Self {
        self.stream_pacing = pacing;
        self
    }

    pub fn with_openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    pub fn with_anthropic_base_url(mut self, url: impl Into<String>) -> Self {
        self.anthropic_base_url = Some(url.into());
        self
    }

    pub fn with_google_base_url(mut self, url: impl Into<String>) -> Self {
        self.google_base_url = Some(url.into());
        self
    }

    pub fn with_ollama_base_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_base_url = Some(url.into());
        self
    }
}

fn parse_positive(variable: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::invalid(variable, "must be greater than zero")),
        Ok(value) => Ok(value),
        Err(err) => Err(ConfigError::invalid(variable, err.to_string())),
    }
}

/// Loads `.env` from the working directory or its parents, if one exists.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(phase = "config", event = "dotenv_loaded", path = %path.display());
            Some(path)
        }
        Err(err) if err.not_found() => None,
        Err(err) => {
            tracing::warn!(phase = "config", event = "dotenv_failed", error = %err);
            None
        }
    }
}
