//! Protocol error types

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Why a protocol step did not succeed
///
/// `Malformed` covers bodies that do not match the endpoint schema;
/// `UnexpectedStatus` and `Rejected` are well-formed failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The request never produced a response (connect, timeout, reset)
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("malformed response (status {status}): {reason}")]
    Malformed { status: u16, reason: String },

    #[error("request rejected (status {status}): {result}")]
    Rejected { status: u16, result: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProtocolError {
    /// HTTP status observed, if a response arrived
    pub fn status(&self) -> Option<u16> {
        match self {
            ProtocolError::UnexpectedStatus { status }
            | ProtocolError::Malformed { status, .. }
            | ProtocolError::Rejected { status, .. } => Some(*status),
            ProtocolError::Transport(_) | ProtocolError::InvalidRequest(_) => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ProtocolError::Transport(_))
    }
}

impl From<reqwest::Error> for ProtocolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ProtocolError::InvalidRequest(err.to_string())
        } else {
            ProtocolError::Transport(err.to_string())
        }
    }
}
