//! Core error types.

use thiserror::Error;

/// Error type returned by user-supplied components (actions, listeners,
/// persisters and factories).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from the state machine runtime.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Failed to create path '{path}' for statemachine. The state name in the supplied path '{state}' could not be found in the defined states of the associated state machine definition matrix")]
    InvalidPath { path: String, state: String },

    #[error("transition action '{action}' failed: {source}")]
    ActionFailed {
        action: String,
        #[source]
        source: BoxError,
    },

    #[error("transition listener failed: {source}")]
    ListenerFailed {
        #[source]
        source: BoxError,
    },

    #[error("failed to persist entity '{entity_id}': {source}")]
    PersistFailed {
        entity_id: String,
        #[source]
        source: BoxError,
    },
}

impl CoreError {
    /// Returns an error code suitable for reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidPath { .. } => "REFERENCE",
            CoreError::ActionFailed { .. } => "RUNTIME",
            CoreError::ListenerFailed { .. } => "RUNTIME",
            CoreError::PersistFailed { .. } => "PERSISTENCE",
        }
    }

    /// Returns whether the error happened while a transition was running.
    ///
    /// Actions that ran before the failure, and the state update when it
    /// already happened, are not rolled back.
    pub fn is_partial_transition(&self) -> bool {
        matches!(
            self,
            CoreError::ActionFailed { .. } | CoreError::ListenerFailed { .. }
        )
    }
}
