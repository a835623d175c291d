//! Error types for the session
//!
//! Every failure falls into one of the operator-facing classes of
//! `ErrorKind`:
//! - transport failures, surfaced without retry
//! - malformed responses, treated as empty results by callers
//! - backend rejections, surfaced verbatim
//! - invariant violations, rejected before any network call
//! - concurrency conflicts (UI lock held, operation in flight)

use crate::install::JobState;
use range_backend::BackendError;
use range_graph::GraphError;
use range_model::{InstanceId, ModelError};
use std::fmt;

/// Result alias for session operations
pub type Result<T> = std::result::Result<T, RangeError>;

/// Main session error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RangeError {
    /// Backend call failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Graph store rejected a mutation
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Record failed model validation
    #[error(transparent)]
    Model(#[from] ModelError),

    /// No instance matches the given id or name
    #[error("instance not found: {0}")]
    UnknownInstance(String),

    /// Tool name is empty
    #[error("tool name is empty")]
    EmptyToolName,

    /// An install job holds the UI lock
    #[error("session is locked while an install job runs")]
    Locked,

    /// Another operation on the same instance is in flight
    #[error("{operation} already in progress on {instance}")]
    Busy {
        /// Instance with the pending operation
        instance: InstanceId,
        /// Operation that holds the token
        operation: String,
    },

    /// Install job state machine misuse
    #[error("invalid job transition {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: JobState,
        /// Requested state
        to: JobState,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Operator-facing failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TransportFailure,
    MalformedResponse,
    BackendRejection,
    InvariantViolation,
    Concurrency,
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TransportFailure => "transport failure",
            Self::MalformedResponse => "malformed response",
            Self::BackendRejection => "backend rejection",
            Self::InvariantViolation => "invariant violation",
            Self::Concurrency => "concurrency conflict",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

impl RangeError {
    /// Classify for the operator
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend(BackendError::Transport(_)) => ErrorKind::TransportFailure,
            Self::Backend(BackendError::Malformed(_)) => ErrorKind::MalformedResponse,
            Self::Backend(BackendError::Rejected { .. }) => ErrorKind::BackendRejection,
            Self::Graph(_)
            | Self::Model(_)
            | Self::UnknownInstance(_)
            | Self::EmptyToolName
            | Self::InvalidTransition { .. } => ErrorKind::InvariantViolation,
            Self::Locked | Self::Busy { .. } => ErrorKind::Concurrency,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the operation was refused before touching the backend
    #[inline]
    #[must_use]
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvariantViolation | ErrorKind::Concurrency | ErrorKind::Configuration
        )
    }
}
