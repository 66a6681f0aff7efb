//! Job state machine.
//!
//! States: `queued → active → completed | failed`. `failed` is terminal
//! for the runtime; the only edge out of it is an explicit operator
//! resubmission, which re-queues the identical payload as a new attempt.

use std::fmt;

use warble_core::JobId;

use crate::error::QueueError;

/// Lifecycle states of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Accepted and waiting for a worker slot.
    Queued,
    /// A handler invocation is running.
    Active,
    /// The handler returned success.
    Completed,
    /// The handler returned an error or timed out.
    Failed,
}

impl JobState {
    /// Returns whether the state is terminal for the runtime.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether a dispatcher may claim the job.
    #[must_use]
    pub const fn is_dispatchable(self) -> bool {
        matches!(self, Self::Queued)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Returns whether the transition is allowed.
///
/// `Failed → Queued` is listed because operator resubmission re-queues a
/// failed job; the runtime itself never takes that edge on its own.
#[must_use]
pub const fn is_valid_transition(from: JobState, to: JobState) -> bool {
    matches!(
        (from, to),
        (JobState::Queued, JobState::Active)
            | (JobState::Active, JobState::Completed)
            | (JobState::Active, JobState::Failed)
            | (JobState::Failed, JobState::Queued)
    )
}

/// Validates a transition, naming the offending job on rejection.
///
/// # Errors
///
/// Returns [`QueueError::InvalidTransition`] if the edge is not allowed.
pub fn validate_transition(job_id: JobId, from: JobState, to: JobState) -> Result<(), QueueError> {
    if is_valid_transition(from, to) {
        return Ok(());
    }
    Err(QueueError::InvalidTransition { job_id, from, to })
}

/// States reachable from `from` in one allowed transition.
#[must_use]
pub fn valid_transitions_from(from: JobState) -> Vec<JobState> {
    [
        JobState::Queued,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
    ]
    .into_iter()
    .filter(|to| is_valid_transition(from, *to))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_moves_to_active_only() {
        assert!(is_valid_transition(JobState::Queued, JobState::Active));
        assert!(!is_valid_transition(JobState::Queued, JobState::Completed));
        assert!(!is_valid_transition(JobState::Queued, JobState::Failed));
        assert!(!is_valid_transition(JobState::Queued, JobState::Queued));
    }

    #[test]
    fn active_terminates_either_way() {
        assert!(is_valid_transition(JobState::Active, JobState::Completed));
        assert!(is_valid_transition(JobState::Active, JobState::Failed));
        assert!(!is_valid_transition(JobState::Active, JobState::Queued));
    }

    #[test]
    fn completed_is_final() {
        assert!(valid_transitions_from(JobState::Completed).is_empty());
    }

    #[test]
    fn failed_requeues_only_by_resubmission() {
        assert_eq!(
            valid_transitions_from(JobState::Failed),
            vec![JobState::Queued]
        );
        assert!(!is_valid_transition(JobState::Failed, JobState::Active));
    }

    #[test]
    fn validate_rejects_bad_edge() {
        let job_id = JobId::generate();
        let err = validate_transition(job_id, JobState::Completed, JobState::Queued).unwrap_err();
        match err {
            QueueError::InvalidTransition { job_id: id, from, to } => {
                assert_eq!(id, job_id);
                assert_eq!(from, JobState::Completed);
                assert_eq!(to, JobState::Queued);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_accepts_good_edge() {
        let result = validate_transition(JobId::generate(), JobState::Queued, JobState::Active);
        assert!(result.is_ok());
    }

    #[test]
    fn terminal_and_dispatchable_predicates() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Active.is_terminal());
        assert!(!JobState::Queued.is_terminal());

        assert!(JobState::Queued.is_dispatchable());
        assert!(!JobState::Active.is_dispatchable());
    }

    #[test]
    fn display_names_are_lowercase() {
        assert_eq!(JobState::Queued.to_string(), "queued");
        assert_eq!(JobState::Active.to_string(), "active");
        assert_eq!(JobState::Completed.to_string(), "completed");
        assert_eq!(JobState::Failed.to_string(), "failed");
    }
}
