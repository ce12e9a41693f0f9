//! Transport-level error shared by every network caller

use std::time::Duration;

/// Failure to obtain a usable response from the proxy collaborator.
///
/// Covers the proxy itself failing, the upstream repository failing behind it,
/// and the bounded wait expiring. Callers treat every variant the same way:
/// the institution is unreachable for the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, DNS or body read failure
    Network { message: String },
    /// No response within the configured bound
    Timeout(Duration),
    /// Response arrived with a non-2xx status
    Status { status: u16 },
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network { message } => write!(f, "network error: {message}"),
            Self::Timeout(d) => write!(f, "timed out after {:.1}s", d.as_secs_f64()),
            Self::Status { status } => write!(f, "HTTP {status}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Convert a reqwest failure, dropping the URL so proxy endpoints stay out of logs.
    ///
    /// `limit` is the client's request timeout, reported when reqwest gave up on it.
    pub fn from_reqwest(e: &reqwest::Error, limit: Duration) -> Self {
        if let Some(status) = e.status() {
            return Self::Status {
                status: status.as_u16(),
            };
        }
        if e.is_timeout() {
            return Self::Timeout(limit);
        }
        Self::network(message_without_url(e))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }
}

/// Render a reqwest error without the request URL.
fn message_without_url(e: &reqwest::Error) -> String {
    let kind = if e.is_connect() {
        "connect"
    } else if e.is_body() || e.is_decode() {
        "body"
    } else {
        "request"
    };
    match std::error::Error::source(e) {
        Some(source) => format!("{kind}: {source}"),
        None => kind.to_string(),
    }
}
