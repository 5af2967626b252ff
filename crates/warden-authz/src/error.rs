//! Authorization error types.

use thiserror::Error;
use uuid::Uuid;
use warden_core::error::WardenError;

#[derive(Debug, Error)]
pub enum AuthzError {
    /// Carries the request in `resource:action1|action2` form.
    #[error("missing permission {0}")]
    Forbidden(String),

    #[error("user {0} is inactive")]
    InactiveUser(Uuid),

    #[error("malformed permission request: {0}")]
    MalformedRequest(String),
}

impl From<AuthzError> for WardenError {
    fn from(err: AuthzError) -> Self {
        WardenError::AuthorizationDenied {
            reason: err.to_string(),
        }
    }
}
