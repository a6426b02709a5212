use std::fmt;

use http::StatusCode;

/// Why a transport was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The server answered `404 Not Found`.
    NotFound,
    /// The server answered with some other status than `200 OK`.
    Status,
    /// Every attempt timed out.
    Timeout,
    /// The caller aborted the request.
    Abort,
    /// The caller reported a network error.
    Network,
}

impl FailureKind {
    /// Short error type tag.
    pub fn error_type(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "NotFound",
            FailureKind::Status => "unknown",
            FailureKind::Timeout => "xhrTimeout",
            FailureKind::Abort => "xhrAbort",
            FailureKind::Network => "xhrError",
        }
    }

    /// Human readable explanation.
    pub fn explain(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "resource not found",
            FailureKind::Status => "unexpected response status",
            FailureKind::Timeout => "request timed out",
            FailureKind::Abort => "request aborted",
            FailureKind::Network => "network error",
        }
    }
}

/// Rejection value of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// What went wrong.
    pub kind: FailureKind,
    /// Response status, if the failure came with one.
    pub status: Option<StatusCode>,
    /// The request type, or the request URL if none was given.
    pub request_id: String,
    /// Number of attempts made.
    pub attempts: u32,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.explain(), self.request_id)?;
        if let Some(status) = self.status {
            write!(f, ", status {}", status.as_u16())?;
        }
        write!(f, " after {} attempt(s)", self.attempts)
    }
}

impl std::error::Error for TransportFailure {}
