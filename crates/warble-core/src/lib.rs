//! Core identifier types for the warble backend.
//!
//! Every document and job in the pipeline is addressed by one of the
//! opaque, UUID-backed identifiers defined here. All of them serialize as
//! canonical hyphenated strings so job payloads and stored documents stay
//! readable in logs and fixtures.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{CommentId, EdgeId, IdError, JobId, NotificationId, PostId, UserId};
