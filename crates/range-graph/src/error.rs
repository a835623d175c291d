//! Error types for the graph store
//!
//! Every variant is an invariant violation detected before any mutation:
//! a rejected operation leaves the store exactly as it was.

use range_model::{EdgeId, InstanceId, ModelError};

/// Graph store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Referenced instance is not in the store
    #[error("instance not found: {0}")]
    UnknownInstance(InstanceId),

    /// Instance id already present
    #[error("instance already exists: {0}")]
    DuplicateInstance(InstanceId),

    /// Neither an instance nor an edge has this id
    #[error("no instance or edge with id: {0}")]
    UnknownElement(String),

    /// Edge from an instance to itself
    #[error("self loop on instance {0}")]
    SelfLoop(InstanceId),

    /// Deletion refused
    #[error("cannot delete {id}: {reason}")]
    ForbiddenDeletion {
        /// Instance that was targeted
        id: InstanceId,
        /// Why the deletion was refused
        reason: String,
    },

    /// Industrial component whose base is missing or not a base role
    #[error("industrial component {component} cannot link to {base}")]
    InvalidBase {
        /// Industrial component
        component: InstanceId,
        /// Requested base
        base: InstanceId,
    },

    /// The link edge of an industrial component can only go with the component
    #[error("edge {0} links an industrial component to its base")]
    LinkEdge(EdgeId),

    /// Edge references an instance that is not in the store
    #[error("edge {0} references a missing instance")]
    DanglingEdge(EdgeId),

    /// Two edge ids over the same ordered pair
    #[error("duplicate connection {from} -> {to}")]
    DuplicateConnection {
        /// Source instance
        from: InstanceId,
        /// Target instance
        to: InstanceId,
    },

    /// Industrial component without exactly one link edge
    #[error("industrial component {id} has {count} link edges")]
    LinkCount {
        /// Industrial component
        id: InstanceId,
        /// Number of edges to its base
        count: usize,
    },

    /// Record failed model validation
    #[error("invalid instance: {0}")]
    Model(#[from] ModelError),
}

impl GraphError {
    /// Create a forbidden deletion error
    pub fn forbidden(id: InstanceId, reason: impl Into<String>) -> Self {
        Self::ForbiddenDeletion {
            id,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_display() {
        let err = GraphError::forbidden(InstanceId::from("m1"), "base instance");
        assert_eq!(err.to_string(), "cannot delete m1: base instance");

        let err: GraphError = ModelError::MissingIdentity.into();
        assert!(matches!(err, GraphError::Model(_)));
    }
}
