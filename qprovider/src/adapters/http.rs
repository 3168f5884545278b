//! HTTP plumbing shared by the reqwest transports.

use reqwest::Response;

use crate::{ProviderError, ProviderErrorKind};

/// Backend error envelope reduced to its message and type/status discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ErrorDetail {
    pub message: String,
    pub discriminator: Option<String>,
}

pub(crate) fn classify_send_error(provider: &str, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() || error.is_connect() {
        return ProviderError::unavailable(provider, error.to_string());
    }

    match error.status() {
        Some(status) => ProviderError::from_status(provider, status.as_u16(), error.to_string()),
        None => ProviderError::invalid_request(provider, error.to_string()),
    }
}

pub(crate) fn decode_error(provider: &str, error: impl std::fmt::Display) -> ProviderError {
    ProviderError::invalid_request(provider, format!("malformed response body: {error}"))
}

/// Reads a failed response and classifies it.
pub(crate) async fn read_error_response(
    provider: &str,
    response: Response,
    extract: fn(&str) -> Option<ErrorDetail>,
) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let detail = extract(&body).unwrap_or_else(|| ErrorDetail {
        message: format!(
            "request failed with status {status}: {}",
            qcommon::truncate(body.trim(), 512)
        ),
        discriminator: None,
    });

    classify_error(provider, Some(status.as_u16()), detail)
}

/// Discriminator first, then status, then message substrings for otherwise
/// unclassified failures.
pub(crate) fn classify_error(provider: &str, status: Option<u16>, detail: ErrorDetail) -> ProviderError {
    if let Some(kind) = detail.discriminator.as_deref().and_then(kind_for_discriminator) {
        let retryable = kind == ProviderErrorKind::RateLimit;
        return ProviderError::new(kind, provider, detail.message, retryable);
    }

    let by_status = status.map(|status| ProviderError::from_status(provider, status, &detail.message));
    match by_status {
        Some(error) if !error.is_invalid_request() => error,
        _ => ProviderError::from_message(provider, detail.message),
    }
}

fn kind_for_discriminator(discriminator: &str) -> Option<ProviderErrorKind> {
    let lowered = discriminator.to_ascii_lowercase();

    if [
        "authentication_error",
        "permission_error",
        "invalid_api_key",
        "unauthenticated",
        "permission_denied",
    ]
    .contains(&lowered.as_str())
    {
        return Some(ProviderErrorKind::Authentication);
    }

    if [
        "rate_limit_error",
        "rate_limit_exceeded",
        "insufficient_quota",
        "overloaded_error",
        "resource_exhausted",
        "unavailable",
    ]
    .contains(&lowered.as_str())
    {
        return Some(ProviderErrorKind::RateLimit);
    }

    None
}

/// Line buffer for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters split across
/// network chunks decode intact.
#[cfg(any(feature = "provider-openai", feature = "provider-anthropic"))]
#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    pending: Vec<u8>,
}

#[cfg(any(feature = "provider-openai", feature = "provider-anthropic"))]
impl SseBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next `data:` payload among the complete lines buffered so far.
    pub fn next_data(&mut self) -> Option<String> {
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line = self.pending.drain(..=newline).collect::<Vec<_>>();
            if let Some(payload) = data_payload(&line) {
                return Some(payload);
            }
        }

        None
    }

    /// Payload of a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.pending);
        data_payload(&line)
    }
}

#[cfg(any(feature = "provider-openai", feature = "provider-anthropic"))]
fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim().strip_prefix("data:")?.trim();

    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}
