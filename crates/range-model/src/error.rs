//! Error types for the entity model

/// Validation and construction errors for model records
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Role string is not one of the known roles
    #[error("invalid role: '{0}'")]
    InvalidRole(String),

    /// Industrial kind is empty or contains characters outside `[a-z0-9_-]`
    #[error("invalid industrial kind: '{0}'")]
    InvalidIndustrialKind(String),

    /// Instance has neither an id nor a name
    #[error("instance has neither id nor name")]
    MissingIdentity,

    /// Industrial component without a base link
    #[error("industrial instance {0} has no linked_to base")]
    MissingLink(String),

    /// Non-industrial instance carrying a base link
    #[error("instance {0} is not industrial but carries linked_to")]
    UnexpectedLink(String),

    /// Attempted to attach an industrial component to a non-base instance
    #[error("instance {id} has role {role} and cannot anchor industrial components")]
    NotABase {
        /// Instance that was offered as the base
        id: String,
        /// Its actual role
        role: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_display() {
        let err = ModelError::NotABase {
            id: "n1".to_string(),
            role: "generic".to_string(),
        };
        assert!(err.to_string().contains("cannot anchor"));
        assert!(ModelError::MissingIdentity.to_string().contains("neither"));
    }
}
