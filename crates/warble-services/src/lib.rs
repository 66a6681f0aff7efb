//! Persistence services and notification fan-out for the warble pipeline.
//!
//! The request layer answers clients from its caches and enqueues a
//! [`JobPayload`] describing each durable mutation; the [`Pipeline`]
//! owns the queues and workers that apply those payloads to the store
//! afterwards. Every write path is idempotent, so the queue runtime's
//! at-least-once delivery and operator resubmission are both safe.
//!
//! Follow and comment writes additionally run [`NotificationFanout`]:
//! one guarded sequence producing at most one persisted notification,
//! one real-time push, and one email job per action.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod comments;
pub mod error;
pub mod fanout;
pub mod followers;
pub mod notifications;
pub mod payload;
pub mod pipeline;
pub mod posts;
pub mod workers;

pub use comments::{CommentApplied, CommentService};
pub use error::{Result, ServiceError};
pub use fanout::{
    FanoutOutcome, FanoutReceipt, FanoutRequest, FanoutSkip, NotificationFanout, StepOutcome,
    INSERT_NOTIFICATION_EVENT,
};
pub use followers::{FollowApplied, FollowerService};
pub use notifications::NotificationService;
pub use payload::{job_names, JobPayload};
pub use pipeline::{queue_names, Pipeline, PipelineConfig};
pub use posts::PostService;
pub use workers::{CommentWorker, EmailWorker, FollowerWorker, NotificationWorker, PostWorker};
