//! The job payload union.
//!
//! One variant per job name the pipeline defines; the serde tag doubles as
//! the job name, so a payload always dispatches to the binding that knows
//! its shape.

use serde::{Deserialize, Serialize};
use warble_core::{EdgeId, NotificationId, PostId, UserId};
use warble_queue::Payload;
use warble_store::{CommentDocument, PostDocument, PostUpdate};

/// Job names bound by the pipeline queues.
pub mod job_names {
    /// Insert a follow edge and its counters.
    pub const ADD_FOLLOWER: &str = "add_follower";
    /// Delete a follow edge and its counters.
    pub const REMOVE_FOLLOWER: &str = "remove_follower";
    /// Insert a comment and its counter.
    pub const ADD_COMMENT: &str = "add_comment";
    /// Insert a post and its counter.
    pub const ADD_POST: &str = "add_post";
    /// Replace a post's content fields.
    pub const UPDATE_POST: &str = "update_post";
    /// Delete a post and its counter.
    pub const DELETE_POST: &str = "delete_post";
    /// Flip a notification's read flag.
    pub const MARK_NOTIFICATION_READ: &str = "mark_notification_read";
    /// Delete a notification record.
    pub const DELETE_NOTIFICATION: &str = "delete_notification";
    /// Hand one rendered email to the mail provider.
    pub const SEND_EMAIL: &str = "send_email";
}

/// A deferred unit of work, tagged by job name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobPayload {
    /// Persist a new follow edge.
    AddFollower {
        /// The acting user (who followed).
        follower_id: UserId,
        /// The user being followed.
        followee_id: UserId,
        /// Actor's handle, used in the notification message.
        follower_username: String,
        /// Edge id minted by the request layer.
        edge_id: EdgeId,
    },

    /// Remove a follow edge.
    RemoveFollower {
        /// The user who unfollowed.
        follower_id: UserId,
        /// The user being unfollowed.
        followee_id: UserId,
    },

    /// Persist a new comment.
    AddComment {
        /// The commented post.
        post_id: PostId,
        /// The post's author (notification recipient).
        post_author_id: UserId,
        /// The commenting user.
        commenter_id: UserId,
        /// Commenter's handle, used in the notification message.
        commenter_username: String,
        /// The full comment document to insert.
        comment: CommentDocument,
    },

    /// Persist a new post.
    AddPost {
        /// The authoring user.
        author_id: UserId,
        /// The full post document to insert.
        post: PostDocument,
    },

    /// Replace a post's content fields.
    UpdatePost {
        /// The post to update.
        post_id: PostId,
        /// Replacement content.
        update: PostUpdate,
    },

    /// Delete a post.
    DeletePost {
        /// The post to delete.
        post_id: PostId,
        /// The post's author, carried for wire fidelity; the store derives
        /// the counter owner from the stored record.
        author_id: UserId,
    },

    /// Flip a notification's read flag.
    MarkNotificationRead {
        /// The notification concerned.
        notification_id: NotificationId,
    },

    /// Delete a notification record.
    DeleteNotification {
        /// The notification concerned.
        notification_id: NotificationId,
    },

    /// Deliver one rendered email.
    SendEmail {
        /// Destination address.
        receiver_email: String,
        /// Subject line.
        subject: String,
        /// Rendered HTML body.
        template: String,
    },
}

impl Payload for JobPayload {
    fn job_name(&self) -> &'static str {
        match self {
            Self::AddFollower { .. } => job_names::ADD_FOLLOWER,
            Self::RemoveFollower { .. } => job_names::REMOVE_FOLLOWER,
            Self::AddComment { .. } => job_names::ADD_COMMENT,
            Self::AddPost { .. } => job_names::ADD_POST,
            Self::UpdatePost { .. } => job_names::UPDATE_POST,
            Self::DeletePost { .. } => job_names::DELETE_POST,
            Self::MarkNotificationRead { .. } => job_names::MARK_NOTIFICATION_READ,
            Self::DeleteNotification { .. } => job_names::DELETE_NOTIFICATION,
            Self::SendEmail { .. } => job_names::SEND_EMAIL,
        }
    }
}
