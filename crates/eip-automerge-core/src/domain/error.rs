//! Error taxonomy for the automerge bot.
//!
//! Only orchestration failures live here. Problems local to one document
//! become [`PolicyViolation`](crate::policy::PolicyViolation)s and never abort
//! a run.

use eip_forge::ForgeError;

/// Errors produced while reading the trigger context.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("unsupported event: {event}")]
    UnsupportedEvent { event: String },

    #[error("trigger does not reference a pull request")]
    MissingPullRequest,

    #[error("environment variable {0} not set")]
    MissingEnv(String),

    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("invalid repository name: {0}")]
    InvalidRepository(String),
}

/// Fatal errors; any of these aborts the run and fails the CI step.
#[derive(Debug, thiserror::Error)]
pub enum AutomergeError {
    #[error("forge error: {0}")]
    Forge(#[from] ForgeError),

    #[error("trigger error: {0}")]
    Trigger(#[from] TriggerError),

    #[error("merge of PR #{number} was rejected: {message}")]
    MergeRejected { number: u64, message: String },

    #[error("task failed: {0}")]
    Task(String),
}

/// Result type for automerge operations.
pub type Result<T> = std::result::Result<T, AutomergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forge_error_converts() {
        let err: AutomergeError = ForgeError::Http("reset".into()).into();
        assert!(err.to_string().contains("forge error"));
        assert!(err.to_string().contains("reset"));
    }

    #[test]
    fn trigger_error_display() {
        let err = AutomergeError::from(TriggerError::UnsupportedEvent {
            event: "push".to_string(),
        });
        assert!(err.to_string().contains("unsupported event: push"));
    }
}
