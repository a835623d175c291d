//! Backend error taxonomy

/// Result alias for backend calls
pub type Result<T> = std::result::Result<T, BackendError>;

/// Failure of a backend call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Connection could not be made or broke mid-response
    #[error("transport failure: {0}")]
    Transport(String),

    /// Response body was not the expected JSON shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Backend answered with a non-success status
    #[error("backend rejected request ({status}): {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },
}

impl BackendError {
    /// Create a rejection
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    #[inline]
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Every reqwest failure is a transport failure, including a body that breaks
/// off mid-read; only JSON decoding produces `Malformed`
impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
