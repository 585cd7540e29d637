use catalog::ServiceError;
use thiserror::Error;

/// Why a user action did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The user has not supplied what the action needs yet.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ActionError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }
}
