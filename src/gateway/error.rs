//! Error types for the external service gateways.

use std::time::Duration;
use thiserror::Error;

/// Coarse failure category shared by every external call.
///
/// All of these degrade to data (an error-flagged result or record); none of
/// them abort a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required credential is absent.
    ConfigMissing,
    /// Non-success response or transport failure.
    Upstream,
    /// Body unparsable or missing expected fields.
    Malformed,
    /// Polling exceeded the maximum wait.
    Timeout,
    /// The request was rejected locally before any network activity.
    InvalidInput,
}

/// Additional context from provider errors for debugging.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code from the provider.
    pub http_status: Option<u16>,
    /// Provider-specific error code (e.g. "rate_limit_exceeded").
    pub provider_code: Option<String>,
    /// Request ID from provider (x-request-id header).
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Errors that can occur when calling the inference gateway or the run service.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Required credential is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream answered with a non-success status or an error payload.
    ///
    /// Displays as the bare upstream message so it can be embedded verbatim
    /// in failure markers.
    #[error("{message}")]
    Upstream {
        service: &'static str,
        message: String,
        context: Option<ErrorContext>,
    },

    /// Response body could not be interpreted.
    #[error("malformed {service} response: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    /// Asynchronous run did not settle in time.
    #[error("{service} run did not finish within {waited:?}")]
    Timeout {
        service: &'static str,
        waited: Duration,
    },

    /// Request rejected before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an upstream error without context.
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
            context: None,
        }
    }

    /// Create an upstream error with context.
    pub fn upstream_with_context(
        service: &'static str,
        message: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
            context: Some(context),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            service,
            message: message.into(),
        }
    }

    /// Create a polling timeout error.
    pub fn timeout(service: &'static str, waited: Duration) -> Self {
        Self::Timeout { service, waited }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Map onto the shared failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::ConfigMissing,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Malformed { .. } => ErrorKind::Malformed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidRequest(_) => ErrorKind::InvalidInput,
            Self::Http(e) if e.is_decode() => ErrorKind::Malformed,
            Self::Http(_) => ErrorKind::Upstream,
        }
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_missing",
            Self::Upstream { .. } => "upstream_error",
            Self::Malformed { .. } => "malformed_response",
            Self::Timeout { .. } => "timeout",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Http(_) => "http_error",
        }
    }

    /// Get the error context if available.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Upstream { context, .. } => context.as_ref(),
            _ => None,
        }
    }

    /// Get the request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_displays_bare_message() {
        let err = ProviderError::upstream("openrouter", "model overloaded");
        assert_eq!(err.to_string(), "model overloaded");
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            ProviderError::config("missing key").kind(),
            ErrorKind::ConfigMissing
        );
        assert_eq!(
            ProviderError::malformed("runs", "no id").kind(),
            ErrorKind::Malformed
        );
        assert_eq!(
            ProviderError::timeout("runs", Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            ProviderError::invalid_request("empty").kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn context_exposes_request_id() {
        let err = ProviderError::upstream_with_context(
            "openrouter",
            "nope",
            ErrorContext::new().with_status(502).with_request_id("req-1"),
        );
        assert_eq!(err.request_id(), Some("req-1"));
        assert_eq!(err.context().and_then(|c| c.http_status), Some(502));
    }
}
