use std::time::Duration;

use thiserror::Error;

/// Failure talking to an upstream collaborator (weather, news feed, article page, model).
///
/// Every variant is recovered by a fallback in the caller; the variant only
/// decides what gets logged.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request timed out after {}s", .timeout.as_secs())]
    Timeout {
        service: &'static str,
        timeout: Duration,
    },

    #[error("{service} connection failed: {message}")]
    Connection {
        service: &'static str,
        message: String,
    },

    #[error("{service} API error {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an unexpected payload: {message}")]
    Payload {
        service: &'static str,
        message: String,
    },
}

impl UpstreamError {
    /// Classify a reqwest failure for `service`.
    pub fn from_reqwest(service: &'static str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout { service, timeout }
        } else if let Some(status) = err.status() {
            UpstreamError::Status {
                service,
                status: status.as_u16(),
                body: String::new(),
            }
        } else if err.is_decode() || err.is_body() {
            UpstreamError::Payload {
                service,
                message: err.to_string(),
            }
        } else {
            UpstreamError::Connection {
                service,
                message: err.to_string(),
            }
        }
    }

    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { .. } => "timeout",
            UpstreamError::Connection { .. } => "connection",
            UpstreamError::Status { .. } => "status",
            UpstreamError::Payload { .. } => "payload",
        }
    }
}

/// Label for an arbitrary error chain: the upstream kind when one is present.
pub fn failure_kind(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<UpstreamError>()
        .map(UpstreamError::kind)
        .unwrap_or("other")
}

/// Errors the discussion flow surfaces to its caller. Model failures are not
/// among them: those end in the templated answer.
#[derive(Debug, Error)]
pub enum DiscussError {
    #[error("missing required parameter: {0}")]
    InvalidInput(&'static str),

    #[error("could not fetch news content from {url}")]
    ContentUnavailable { url: String },
}
