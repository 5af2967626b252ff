//! Error types for the Warden system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Duplicate rule: {reason}")]
    DuplicateRule { reason: String },

    #[error("Duplicate group name: {name}")]
    DuplicateGroup { name: String },

    #[error("Unknown rule id: {id}")]
    UnknownRule { id: String },

    #[error("Group {id} is still assigned to {users} user(s)")]
    GroupInUse { id: String, users: u64 },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type WardenResult<T> = Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_in_use_message_names_the_user_count() {
        let err = WardenError::GroupInUse {
            id: "g1".into(),
            users: 3,
        };
        assert_eq!(err.to_string(), "Group g1 is still assigned to 3 user(s)");
    }

    #[test]
    fn error_display_variants() {
        let errors = vec![
            WardenError::NotFound {
                entity: "rule".into(),
                id: "1".into(),
            },
            WardenError::DuplicateRule {
                reason: "name".into(),
            },
            WardenError::DuplicateGroup {
                name: "Admin".into(),
            },
            WardenError::UnknownRule { id: "x".into() },
            WardenError::Database("boom".into()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
