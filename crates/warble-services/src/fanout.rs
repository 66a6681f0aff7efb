//! Notification fan-out.
//!
//! One action becomes at most one notification record, one real-time push,
//! and one email job. The sequence is guarded (self actions and disabled
//! preference categories deliver nothing), snapshotting (the record copies
//! the triggering content so later edits don't rewrite history), and
//! ordered (the record is persisted before the push, so a client reacting
//! to the event always finds it in the inbox).
//!
//! Failures after the guards never abort the remaining steps; each step's
//! outcome lands in the [`FanoutReceipt`] and the durable mutation that
//! triggered the fan-out stands regardless.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use warble_core::{EdgeId, JobId, NotificationId, UserId};
use warble_delivery::{Broadcaster, NotificationTemplate, RealtimeEvent};
use warble_queue::JobQueue;
use warble_store::{
    CommentDocument, NotificationDocument, NotificationKind, PostDocument, Store, UserCache,
    UserDocument,
};

use crate::error::Result;
use crate::payload::JobPayload;

/// Wire name of the real-time event carrying a fresh notification.
pub const INSERT_NOTIFICATION_EVENT: &str = "insert notification";

/// Everything one fan-out attempt needs to know about the triggering
/// action.
#[derive(Debug, Clone)]
pub struct FanoutRequest {
    /// The acting user.
    pub actor_id: UserId,
    /// Actor's handle, interpolated into the message.
    pub actor_username: String,
    /// The user to notify.
    pub recipient_id: UserId,
    /// Event kind; selects message, header, and preference category.
    pub kind: NotificationKind,
    /// The entity the event concerns (follower for follows, post for
    /// comments).
    pub entity_id: Uuid,
    /// The record the event created (edge or comment).
    pub created_item_id: Uuid,
    /// Comment text snapshot, empty for follows.
    pub comment_text: String,
    /// Post body snapshot, empty for follows.
    pub post_excerpt: String,
    /// Post image id snapshot.
    pub img_id: String,
    /// Post image version snapshot.
    pub img_version: String,
    /// Post gif URL snapshot.
    pub gif_url: String,
}

impl FanoutRequest {
    /// Request for a fresh follow edge, addressed to the followee.
    #[must_use]
    pub fn follow(
        follower_id: UserId,
        followee_id: UserId,
        follower_username: &str,
        edge_id: EdgeId,
    ) -> Self {
        Self {
            actor_id: follower_id,
            actor_username: follower_username.to_string(),
            recipient_id: followee_id,
            kind: NotificationKind::Follows,
            entity_id: *follower_id.as_uuid(),
            created_item_id: *edge_id.as_uuid(),
            comment_text: String::new(),
            post_excerpt: String::new(),
            img_id: String::new(),
            img_version: String::new(),
            gif_url: String::new(),
        }
    }

    /// Request for a fresh comment, addressed to the post's author and
    /// snapshotting both the comment and the post.
    #[must_use]
    pub fn comment(
        post_author_id: UserId,
        commenter_username: &str,
        comment: &CommentDocument,
        post: &PostDocument,
    ) -> Self {
        Self {
            actor_id: comment.author_id,
            actor_username: commenter_username.to_string(),
            recipient_id: post_author_id,
            kind: NotificationKind::Comment,
            entity_id: *post.post_id.as_uuid(),
            created_item_id: *comment.comment_id.as_uuid(),
            comment_text: comment.text.clone(),
            post_excerpt: post.text.clone(),
            img_id: post.img_id.clone(),
            img_version: post.img_version.clone(),
            gif_url: post.gif_url.clone(),
        }
    }
}

/// Why a fan-out attempt ended before any delivery was tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutSkip {
    /// Actor and recipient are the same user.
    SelfAction,
    /// No user document exists for the recipient.
    UnknownRecipient,
    /// The recipient disabled this notification category.
    PreferenceDisabled,
    /// The content to snapshot no longer exists.
    SourceMissing,
}

/// Outcome of one delivery step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step was not attempted.
    #[default]
    Skipped,
    /// The step succeeded.
    Ok,
    /// The step failed with the recorded reason.
    Failed(String),
}

/// Per-step results of one fan-out attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReceipt {
    /// Id of the notification record the attempt built.
    pub notification_id: NotificationId,
    /// Outcome of persisting the record.
    pub persisted: StepOutcome,
    /// Outcome of the real-time push.
    pub pushed: StepOutcome,
    /// Outcome of enqueueing the email job.
    pub email_enqueued: StepOutcome,
}

impl FanoutReceipt {
    fn new(notification_id: NotificationId) -> Self {
        Self {
            notification_id,
            persisted: StepOutcome::Skipped,
            pushed: StepOutcome::Skipped,
            email_enqueued: StepOutcome::Skipped,
        }
    }

    /// Whether every step ran and succeeded.
    #[must_use]
    pub fn fully_delivered(&self) -> bool {
        self.persisted == StepOutcome::Ok
            && self.pushed == StepOutcome::Ok
            && self.email_enqueued == StepOutcome::Ok
    }

    /// Whether any step failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        matches!(self.persisted, StepOutcome::Failed(_))
            || matches!(self.pushed, StepOutcome::Failed(_))
            || matches!(self.email_enqueued, StepOutcome::Failed(_))
    }
}

/// Result of one fan-out attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanoutOutcome {
    /// A guard ended the attempt; nothing was delivered.
    Skipped(FanoutSkip),
    /// Delivery was attempted; the receipt holds per-step results.
    Attempted(FanoutReceipt),
}

impl FanoutOutcome {
    /// The receipt, when delivery was attempted.
    #[must_use]
    pub const fn receipt(&self) -> Option<&FanoutReceipt> {
        match self {
            Self::Skipped(_) => None,
            Self::Attempted(receipt) => Some(receipt),
        }
    }
}

/// Builds, persists, and delivers notifications for the persistence
/// services.
pub struct NotificationFanout<S> {
    store: Arc<S>,
    cache: Arc<dyn UserCache>,
    broadcaster: Arc<dyn Broadcaster>,
    email_queue: JobQueue<JobPayload>,
}

impl<S: Store> NotificationFanout<S> {
    /// Creates a fan-out over the given store, cache, and sinks.
    ///
    /// `email_queue` must have the email job name bound before deliveries
    /// are attempted, or the email step will fail in the receipt.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        cache: Arc<dyn UserCache>,
        broadcaster: Arc<dyn Broadcaster>,
        email_queue: JobQueue<JobPayload>,
    ) -> Self {
        Self {
            store,
            cache,
            broadcaster,
            email_queue,
        }
    }

    /// Runs one fan-out attempt.
    ///
    /// Guards first: a self action, an unknown recipient, or a disabled
    /// preference category delivers nothing. Past the guards, the
    /// notification is persisted, then pushed, then its email job is
    /// enqueued; each step's outcome is recorded in the receipt and a
    /// failed step never aborts the ones that can still run. The push is
    /// skipped when the persist failed, keeping the event-implies-readable
    /// ordering intact.
    ///
    /// # Errors
    ///
    /// Returns an error only when the recipient lookup's store fallback
    /// fails; failures after the guards land in the receipt instead.
    pub async fn deliver(&self, request: FanoutRequest) -> Result<FanoutOutcome> {
        if request.actor_id == request.recipient_id {
            tracing::debug!(actor = %request.actor_id, "Fan-out skipped: self action");
            return Ok(FanoutOutcome::Skipped(FanoutSkip::SelfAction));
        }

        let Some(recipient) = self.lookup_recipient(&request.recipient_id)? else {
            tracing::warn!(
                recipient = %request.recipient_id,
                "Fan-out skipped: unknown recipient"
            );
            return Ok(FanoutOutcome::Skipped(FanoutSkip::UnknownRecipient));
        };

        if !recipient.notifications.enabled(request.kind.category()) {
            tracing::debug!(
                recipient = %request.recipient_id,
                kind = request.kind.as_str(),
                "Fan-out skipped: category disabled by preference"
            );
            return Ok(FanoutOutcome::Skipped(FanoutSkip::PreferenceDisabled));
        }

        let message = message_for(request.kind, &request.actor_username);
        let notification = NotificationDocument {
            notification_id: NotificationId::generate(),
            user_from: request.actor_id,
            user_to: request.recipient_id,
            kind: request.kind,
            message: message.clone(),
            entity_id: request.entity_id,
            created_item_id: request.created_item_id,
            read: false,
            comment_text: request.comment_text,
            post_excerpt: request.post_excerpt,
            img_id: request.img_id,
            img_version: request.img_version,
            gif_url: request.gif_url,
            created_at: Utc::now(),
        };

        let mut receipt = FanoutReceipt::new(notification.notification_id);

        receipt.persisted = match self.store.insert_notification(&notification) {
            Ok(_) => {
                tracing::info!(
                    notification_id = %notification.notification_id,
                    recipient = %notification.user_to,
                    kind = notification.kind.as_str(),
                    "Persisted notification"
                );
                StepOutcome::Ok
            }
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification.notification_id,
                    error = %e,
                    "Notification persist failed"
                );
                StepOutcome::Failed(e.to_string())
            }
        };

        // Push only after a successful persist, so a client reacting to
        // the event always finds the record in the inbox.
        receipt.pushed = if receipt.persisted == StepOutcome::Ok {
            match self.push(&notification).await {
                Ok(()) => StepOutcome::Ok,
                Err(e) => {
                    tracing::warn!(
                        notification_id = %notification.notification_id,
                        error = %e,
                        "Realtime push failed"
                    );
                    StepOutcome::Failed(e.to_string())
                }
            }
        } else {
            StepOutcome::Skipped
        };

        receipt.email_enqueued = match self.enqueue_email(&recipient, request.kind, &message) {
            Ok(job_id) => {
                tracing::debug!(
                    job_id = %job_id,
                    recipient = %recipient.user_id,
                    "Enqueued notification email"
                );
                StepOutcome::Ok
            }
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification.notification_id,
                    error = %e,
                    "Email enqueue failed"
                );
                StepOutcome::Failed(e.to_string())
            }
        };

        Ok(FanoutOutcome::Attempted(receipt))
    }

    /// Reads the recipient from the cache, falling back to the store.
    fn lookup_recipient(&self, user_id: &UserId) -> Result<Option<UserDocument>> {
        if let Some(user) = self.cache.get_user(user_id) {
            tracing::debug!(user_id = %user_id, "Recipient served from cache");
            return Ok(Some(user));
        }
        Ok(self.store.get_user(user_id)?)
    }

    async fn push(&self, notification: &NotificationDocument) -> warble_delivery::Result<()> {
        let event = RealtimeEvent::new(
            INSERT_NOTIFICATION_EVENT,
            notification.user_to,
            notification,
        )?;
        self.broadcaster.emit(event).await
    }

    fn enqueue_email(
        &self,
        recipient: &UserDocument,
        kind: NotificationKind,
        message: &str,
    ) -> Result<JobId> {
        let template = NotificationTemplate {
            username: recipient.username.clone(),
            message: message.to_string(),
            header: header_for(kind).to_string(),
        }
        .render();

        let job_id = self.email_queue.enqueue(JobPayload::SendEmail {
            receiver_email: recipient.email.clone(),
            subject: subject_for(kind, message),
            template,
        })?;
        Ok(job_id)
    }
}

/// The notification message line for a kind.
fn message_for(kind: NotificationKind, username: &str) -> String {
    match kind {
        NotificationKind::Follows => format!("{username} is now following you."),
        NotificationKind::Comment => format!("{username} commented on your post."),
    }
}

/// The email heading for a kind.
const fn header_for(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Follows => "Follower Notification",
        NotificationKind::Comment => "Comment Notification",
    }
}

/// The email subject for a kind. Follows reuse the message line.
fn subject_for(kind: NotificationKind, message: &str) -> String {
    match kind {
        NotificationKind::Follows => message.to_string(),
        NotificationKind::Comment => "Post notification".to_string(),
    }
}
