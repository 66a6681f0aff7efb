//! Generic in-process job queue with named handler bindings.
//!
//! A [`JobQueue`] holds jobs for one named queue. Each job name is bound to
//! one [`JobHandler`] with its own concurrency limit; a dispatcher task per
//! binding claims a semaphore permit, marks the job active, and spawns the
//! handler invocation, so dispatch follows enqueue order while completions
//! may interleave. Delivery is at-least-once: handlers must tolerate
//! replayed payloads.
//!
//! Failed jobs are never retried automatically. They stay in the queue's
//! ledger with their error and payload digest; [`JobQueue::failed_jobs`]
//! exposes them and [`JobQueue::resubmit`] re-queues one explicitly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod job;
pub mod lifecycle;
pub mod metrics;
pub mod queue;

pub use error::{HandlerError, QueueError, Result};
pub use job::{payload_digest, Job, JobRecord, Payload};
pub use lifecycle::JobState;
pub use metrics::{MetricsSnapshot, QueueMetrics};
pub use queue::{JobHandler, JobQueue, QueueConfig};
