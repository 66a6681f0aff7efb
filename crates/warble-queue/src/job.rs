//! Jobs, payloads, and ledger records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use warble_core::JobId;

use crate::lifecycle::JobState;

/// A queueable payload.
///
/// The job name selects the handler binding on the queue the payload is
/// enqueued to. `Serialize` exists so failures can be logged with a digest
/// rather than the raw payload.
pub trait Payload: Clone + Send + Sync + Serialize + 'static {
    /// Name of the handler binding this payload dispatches under.
    fn job_name(&self) -> &'static str;
}

/// A dispatched unit of work.
#[derive(Debug, Clone)]
pub struct Job<P> {
    /// Id assigned at enqueue time.
    pub job_id: JobId,
    /// Handler binding name.
    pub job_name: &'static str,
    /// The payload handed to the handler.
    pub payload: P,
    /// When the job was accepted.
    pub enqueued_at: DateTime<Utc>,
    /// 1 for the first dispatch; incremented by resubmission.
    pub attempt: u32,
}

/// Ledger entry tracking one job across its lifetime.
#[derive(Debug, Clone)]
pub struct JobRecord<P> {
    /// Job id.
    pub job_id: JobId,
    /// Handler binding name.
    pub job_name: &'static str,
    /// The payload as enqueued, kept so failed jobs can be resubmitted.
    pub payload: P,
    /// Short fingerprint of the payload, used in failure logs.
    pub payload_digest: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// Dispatch attempts so far.
    pub attempts: u32,
    /// When the job was accepted.
    pub enqueued_at: DateTime<Utc>,
    /// When the most recent attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Error message from the most recent failed attempt.
    pub error: Option<String>,
}

/// Short fingerprint of a payload for logs.
///
/// Hashes the JSON encoding; an unserializable payload falls back to a
/// fixed marker so the logging path can never fail a job.
#[must_use]
pub fn payload_digest<P: Serialize>(payload: &P) -> String {
    match serde_json::to_vec(payload) {
        Ok(bytes) => blake3::hash(&bytes).to_hex()[..16].to_string(),
        Err(_) => "unserializable".to_string(),
    }
}
