//! Queue handler bindings.
//!
//! One worker type per service, each accepting only the job names its
//! queue registers it for. A payload landing on the wrong worker is a
//! wiring bug and fails the job rather than being silently dropped.

use std::sync::Arc;

use async_trait::async_trait;
use warble_delivery::{MailDispatcher, OutboundEmail};
use warble_queue::{HandlerError, JobHandler, Payload};
use warble_store::Store;

use crate::comments::CommentService;
use crate::error::ServiceError;
use crate::followers::FollowerService;
use crate::notifications::NotificationService;
use crate::payload::JobPayload;
use crate::posts::PostService;

fn unexpected_job(worker: &str, payload: &JobPayload) -> HandlerError {
    HandlerError::new(format!(
        "{worker} worker cannot handle job '{}'",
        payload.job_name()
    ))
}

/// Applies `add_follower` and `remove_follower` jobs.
pub struct FollowerWorker<S> {
    service: Arc<FollowerService<S>>,
}

impl<S> FollowerWorker<S> {
    /// Binds the worker to its service.
    #[must_use]
    pub fn new(service: Arc<FollowerService<S>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S: Store + 'static> JobHandler<JobPayload> for FollowerWorker<S> {
    async fn run(&self, payload: JobPayload) -> Result<(), HandlerError> {
        match payload {
            JobPayload::AddFollower {
                follower_id,
                followee_id,
                follower_username,
                edge_id,
            } => {
                self.service
                    .add_follower(follower_id, followee_id, &follower_username, edge_id)
                    .await?;
                Ok(())
            }
            JobPayload::RemoveFollower {
                follower_id,
                followee_id,
            } => {
                self.service.remove_follower(follower_id, followee_id).await?;
                Ok(())
            }
            other => Err(unexpected_job("follower", &other)),
        }
    }
}

/// Applies `add_post`, `update_post` and `delete_post` jobs.
pub struct PostWorker<S> {
    service: Arc<PostService<S>>,
}

impl<S> PostWorker<S> {
    /// Binds the worker to its service.
    #[must_use]
    pub fn new(service: Arc<PostService<S>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S: Store + 'static> JobHandler<JobPayload> for PostWorker<S> {
    async fn run(&self, payload: JobPayload) -> Result<(), HandlerError> {
        match payload {
            JobPayload::AddPost { author_id: _, post } => {
                self.service.add_post(&post)?;
                Ok(())
            }
            JobPayload::UpdatePost { post_id, update } => {
                self.service.update_post(&post_id, &update)?;
                Ok(())
            }
            JobPayload::DeletePost {
                post_id,
                author_id: _,
            } => {
                self.service.delete_post(&post_id)?;
                Ok(())
            }
            other => Err(unexpected_job("post", &other)),
        }
    }
}

/// Applies `add_comment` jobs.
pub struct CommentWorker<S> {
    service: Arc<CommentService<S>>,
}

impl<S> CommentWorker<S> {
    /// Binds the worker to its service.
    #[must_use]
    pub fn new(service: Arc<CommentService<S>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S: Store + 'static> JobHandler<JobPayload> for CommentWorker<S> {
    async fn run(&self, payload: JobPayload) -> Result<(), HandlerError> {
        match payload {
            JobPayload::AddComment {
                post_id,
                post_author_id,
                commenter_id: _,
                commenter_username,
                comment,
            } => {
                self.service
                    .add_comment(post_id, post_author_id, &commenter_username, comment)
                    .await?;
                Ok(())
            }
            other => Err(unexpected_job("comment", &other)),
        }
    }
}

/// Applies `mark_notification_read` and `delete_notification` jobs.
pub struct NotificationWorker<S> {
    service: Arc<NotificationService<S>>,
}

impl<S> NotificationWorker<S> {
    /// Binds the worker to its service.
    #[must_use]
    pub fn new(service: Arc<NotificationService<S>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S: Store + 'static> JobHandler<JobPayload> for NotificationWorker<S> {
    async fn run(&self, payload: JobPayload) -> Result<(), HandlerError> {
        match payload {
            JobPayload::MarkNotificationRead { notification_id } => {
                self.service.mark_read(&notification_id)?;
                Ok(())
            }
            JobPayload::DeleteNotification { notification_id } => {
                self.service.delete(&notification_id)?;
                Ok(())
            }
            other => Err(unexpected_job("notification", &other)),
        }
    }
}

/// Applies `send_email` jobs by handing them to the mail dispatcher.
///
/// A rejected or unreachable provider fails the job; the payload stays
/// on the failed list for operator resubmission.
pub struct EmailWorker {
    dispatcher: Arc<dyn MailDispatcher>,
}

impl EmailWorker {
    /// Binds the worker to its dispatcher.
    #[must_use]
    pub fn new(dispatcher: Arc<dyn MailDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl JobHandler<JobPayload> for EmailWorker {
    async fn run(&self, payload: JobPayload) -> Result<(), HandlerError> {
        match payload {
            JobPayload::SendEmail {
                receiver_email,
                subject,
                template,
            } => {
                let email = OutboundEmail {
                    receiver_email,
                    subject,
                    template,
                };
                self.dispatcher
                    .send(&email)
                    .await
                    .map_err(ServiceError::from)?;
                Ok(())
            }
            other => Err(unexpected_job("email", &other)),
        }
    }
}
