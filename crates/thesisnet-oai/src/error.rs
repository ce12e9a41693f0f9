//! Errors from talking to an OAI-PMH endpoint

use thesisnet_core::TransportError;

use crate::xml::XmlError;

/// OAI error code for an empty result set; a normal, empty completion.
pub const NO_RECORDS_MATCH: &str = "noRecordsMatch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OaiError {
    /// Proxy/network failure, timeout or non-2xx status
    Transport(TransportError),
    /// Well-formed response carrying an OAI `<error>` element
    Protocol { code: String, message: String },
    /// Body (or a single record) could not be read as XML
    Malformed(String),
}

impl std::fmt::Display for OaiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Protocol { code, message } if message.is_empty() => {
                write!(f, "OAI error {code}")
            }
            Self::Protocol { code, message } => write!(f, "OAI error {code}: {message}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for OaiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for OaiError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<XmlError> for OaiError {
    fn from(e: XmlError) -> Self {
        Self::Malformed(e.0)
    }
}

impl OaiError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// `noRecordsMatch`: the repository has nothing for this request.
    pub fn is_no_records_match(&self) -> bool {
        matches!(self, Self::Protocol { code, .. } if code == NO_RECORDS_MATCH)
    }
}
