//! Normalized provider error kinds and classification helpers.
//!
//! Every adapter maps backend failures into exactly one [`ProviderErrorKind`], tagged with
//! the provider name, before the error crosses the provider contract.
//!
//! ```rust
//! use qprovider::{ProviderError, ProviderErrorKind};
//!
//! let auth = ProviderError::from_status("openai", 401, "invalid api key");
//! assert_eq!(auth.kind, ProviderErrorKind::Authentication);
//! assert_eq!(auth.provider, "openai");
//! assert!(!auth.retryable);
//!
//! let throttled = ProviderError::from_status("anthropic", 429, "slow down");
//! assert!(throttled.retryable);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimit,
    InvalidRequest,
}

impl Display for ProviderErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Authentication => "AuthenticationError",
            Self::RateLimit => "RateLimitError",
            Self::InvalidRequest => "InvalidRequestError",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub provider: String,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(
        kind: ProviderErrorKind,
        provider: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            kind,
            provider: provider.into(),
            message: message.into(),
            retryable,
        }
    }

    pub fn authentication(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, provider, message, false)
    }

    pub fn rate_limit(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimit, provider, message, true)
    }

    pub fn invalid_request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, provider, message, false)
    }

    /// Transient backend trouble (timeouts, overload, 5xx, dropped connections).
    ///
    /// These share the retry semantics of throttling, so they are reported as
    /// [`ProviderErrorKind::RateLimit`].
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::rate_limit(provider, message)
    }

    pub fn deadline_elapsed(provider: impl Into<String>, deadline_ms: u128) -> Self {
        Self::unavailable(
            provider,
            format!("request deadline of {deadline_ms}ms elapsed"),
        )
    }

    /// Classifies an HTTP failure status.
    pub fn from_status(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::authentication(provider, message),
            429 => Self::rate_limit(provider, message),
            408 | 500..=599 => Self::unavailable(provider, message),
            _ => Self::invalid_request(provider, message),
        }
    }

    /// Classifies a failure that only carries a message (SDK-less errors, stream error events).
    pub fn from_message(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();

        let kind = if ["api key", "api_key", "unauthorized", "authentication", "permission denied"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            ProviderErrorKind::Authentication
        } else if ["rate limit", "rate_limit", "too many requests", "quota", "overloaded"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            ProviderErrorKind::RateLimit
        } else {
            ProviderErrorKind::InvalidRequest
        };

        let retryable = kind == ProviderErrorKind::RateLimit;
        Self::new(kind, provider, message, retryable)
    }

    pub fn is_authentication(&self) -> bool {
        self.kind == ProviderErrorKind::Authentication
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind == ProviderErrorKind::RateLimit
    }

    pub fn is_invalid_request(&self) -> bool {
        self.kind == ProviderErrorKind::InvalidRequest
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.kind, self.provider, self.message)
    }
}

impl Error for ProviderError {}
