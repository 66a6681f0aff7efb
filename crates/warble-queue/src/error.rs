//! Error types for the queue runtime.

use thiserror::Error;
use warble_core::JobId;

use crate::lifecycle::JobState;

/// Result alias for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors returned by queue registration and dispatch operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No handler is bound for the job name on this queue.
    #[error("no handler registered for job '{job_name}' on queue '{queue}'")]
    NoHandler {
        /// Queue that rejected the payload.
        queue: String,
        /// Job name with no binding.
        job_name: &'static str,
    },

    /// A handler is already bound for the job name on this queue.
    #[error("handler already registered for job '{job_name}' on queue '{queue}'")]
    AlreadyRegistered {
        /// Queue that rejected the registration.
        queue: String,
        /// Job name already bound.
        job_name: &'static str,
    },

    /// The queue has been shut down and accepts no further work.
    #[error("queue '{queue}' is shut down")]
    ShutDown {
        /// Queue that rejected the work.
        queue: String,
    },

    /// No job with the given id exists in the ledger.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// The job is not in a state that allows the requested transition.
    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The job concerned.
        job_id: JobId,
        /// Its current state.
        from: JobState,
        /// The state that was requested.
        to: JobState,
    },
}

/// Failure reported by a job handler.
///
/// The runtime records the message on the job and logs it alongside the
/// payload digest; it never inspects the content.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Creates a handler error from any displayable cause.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
