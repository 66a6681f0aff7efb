//! Document types persisted by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warble_core::{CommentId, EdgeId, NotificationId, PostId, UserId};

/// Per-user switches gating notification categories.
///
/// Owned by the user-profile domain; this pipeline only reads them. Every
/// category starts enabled, matching a fresh account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceFlags {
    /// Direct messages.
    pub messages: bool,
    /// Reactions to own content.
    pub reactions: bool,
    /// Comments on own posts.
    pub comments: bool,
    /// New followers.
    pub follows: bool,
}

impl Default for PreferenceFlags {
    fn default() -> Self {
        Self {
            messages: true,
            reactions: true,
            comments: true,
            follows: true,
        }
    }
}

impl PreferenceFlags {
    /// Returns whether the given category is enabled.
    #[must_use]
    pub const fn enabled(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::Messages => self.messages,
            NotificationCategory::Reactions => self.reactions,
            NotificationCategory::Comments => self.comments,
            NotificationCategory::Follows => self.follows,
        }
    }
}

/// Notification categories a user can opt out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// Direct messages.
    Messages,
    /// Reactions to own content.
    Reactions,
    /// Comments on own posts.
    Comments,
    /// New followers.
    Follows,
}

/// The kind of event a notification record describes.
///
/// The serialized names are the wire values clients match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone started following the recipient.
    Follows,
    /// Someone commented on the recipient's post.
    Comment,
}

impl NotificationKind {
    /// The preference category that gates this kind.
    #[must_use]
    pub const fn category(self) -> NotificationCategory {
        match self {
            Self::Follows => NotificationCategory::Follows,
            Self::Comment => NotificationCategory::Comments,
        }
    }

    /// Stable string form, identical to the serialized representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Follows => "follows",
            Self::Comment => "comment",
        }
    }
}

/// A user account as this pipeline sees it.
///
/// Counter fields are deliberately absent: they live in the counter column
/// family so an increment never rewrites the document. Reads that need
/// counts join them back via [`UserCounters`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    /// Account id.
    pub user_id: UserId,
    /// Display handle.
    pub username: String,
    /// Address notification emails go to.
    pub email: String,
    /// Avatar background color.
    pub avatar_color: String,
    /// Notification preferences.
    pub notifications: PreferenceFlags,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
}

/// Point-in-time counter values for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserCounters {
    /// Users following this user.
    pub followers_count: i64,
    /// Users this user follows.
    pub following_count: i64,
    /// Posts authored by this user.
    pub posts_count: i64,
}

/// Counter fields maintained outside the documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CounterField {
    /// Followers of a user.
    Followers = 1,
    /// Users a user follows.
    Following = 2,
    /// Posts authored by a user.
    Posts = 3,
    /// Comments on a post.
    Comments = 4,
}

impl CounterField {
    /// Stable key tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// A directed follow relationship.
///
/// The store keys edges by the ordered (follower, followee) pair, so a
/// replayed insert that minted a fresh edge id still lands on the same
/// record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowEdge {
    /// Document id carried by the originating request.
    pub edge_id: EdgeId,
    /// The user who follows.
    pub follower_id: UserId,
    /// The user being followed.
    pub followee_id: UserId,
    /// When the edge was created.
    pub created_at: DateTime<Utc>,
}

/// A follower or followee entry joined with its user document and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerView {
    /// The related user's id.
    pub user_id: UserId,
    /// Their handle.
    pub username: String,
    /// Their avatar color.
    pub avatar_color: String,
    /// Their follower count at read time.
    pub followers_count: i64,
    /// Their following count at read time.
    pub following_count: i64,
    /// Their post count at read time.
    pub posts_count: i64,
    /// When the edge was created.
    pub followed_at: DateTime<Utc>,
}

/// A post document.
///
/// Media fields use the empty string for "none"; the page filters test
/// against that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDocument {
    /// Post id, minted by the request layer.
    pub post_id: PostId,
    /// Authoring user.
    pub author_id: UserId,
    /// Author's handle, denormalized for feed rendering.
    pub username: String,
    /// Body text.
    pub text: String,
    /// Background color for text-only posts.
    pub bg_color: String,
    /// Audience setting.
    pub privacy: String,
    /// Feeling tag.
    pub feelings: String,
    /// Attached gif URL, empty when absent.
    pub gif_url: String,
    /// Attached image id, empty when absent.
    pub img_id: String,
    /// Attached image version, empty when absent.
    pub img_version: String,
    /// Attached video id, empty when absent.
    pub video_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl PostDocument {
    /// Replaces the mutable content fields with the given values.
    ///
    /// Identity fields (`post_id`, `author_id`, `username`, `created_at`)
    /// are untouched, so applying the same update twice is a no-op.
    pub fn apply_update(&mut self, update: &PostUpdate) {
        self.text = update.text.clone();
        self.bg_color = update.bg_color.clone();
        self.privacy = update.privacy.clone();
        self.feelings = update.feelings.clone();
        self.gif_url = update.gif_url.clone();
        self.img_id = update.img_id.clone();
        self.img_version = update.img_version.clone();
        self.video_id = update.video_id.clone();
    }
}

/// Replacement values for a post's mutable content fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostUpdate {
    /// Body text.
    pub text: String,
    /// Background color.
    pub bg_color: String,
    /// Audience setting.
    pub privacy: String,
    /// Feeling tag.
    pub feelings: String,
    /// Gif URL, empty when absent.
    pub gif_url: String,
    /// Image id, empty when absent.
    pub img_id: String,
    /// Image version, empty when absent.
    pub img_version: String,
    /// Video id, empty when absent.
    pub video_id: String,
}

/// Page filters for post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    /// Every post.
    All,
    /// Posts carrying an image or a gif.
    WithImages,
    /// Posts carrying a video.
    WithVideos,
}

impl PostFilter {
    /// Returns whether the post passes this filter.
    #[must_use]
    pub fn matches(&self, post: &PostDocument) -> bool {
        match self {
            Self::All => true,
            Self::WithImages => !post.img_id.is_empty() || !post.gif_url.is_empty(),
            Self::WithVideos => !post.video_id.is_empty(),
        }
    }
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentDocument {
    /// Comment id, minted by the request layer; the idempotency key.
    pub comment_id: CommentId,
    /// Post the comment belongs to.
    pub post_id: PostId,
    /// Commenting user.
    pub author_id: UserId,
    /// Commenter's handle.
    pub username: String,
    /// Commenter's avatar color.
    pub avatar_color: String,
    /// Body text.
    pub text: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Distinct commenter names on a post plus the total comment count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentNameList {
    /// Unique usernames, sorted.
    pub names: Vec<String>,
    /// Total comments, counting repeat commenters.
    pub count: usize,
}

/// A persisted notification.
///
/// Immutable after creation except for the read flag and deletion. Content
/// fields are snapshots copied at fan-out time, so editing or deleting the
/// source later leaves the notification intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDocument {
    /// Record id.
    pub notification_id: NotificationId,
    /// Acting user.
    pub user_from: UserId,
    /// Recipient.
    pub user_to: UserId,
    /// Event kind.
    pub kind: NotificationKind,
    /// Human-readable message, also the email body line.
    pub message: String,
    /// Id of the entity the event concerns: the follower for follows, the
    /// post for comments. Raw because the referenced type varies by kind.
    pub entity_id: Uuid,
    /// Id of the record the event created: the edge or the comment.
    pub created_item_id: Uuid,
    /// Whether the recipient has opened it.
    pub read: bool,
    /// Snapshot of the comment text, empty for other kinds.
    pub comment_text: String,
    /// Snapshot of the post body, empty for other kinds.
    pub post_excerpt: String,
    /// Snapshot of the post's image id.
    pub img_id: String,
    /// Snapshot of the post's image version.
    pub img_version: String,
    /// Snapshot of the post's gif URL.
    pub gif_url: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Before/after counter values from a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterReconciliation {
    /// Stored values read before the repair.
    pub before: UserCounters,
    /// Values recomputed from the authoritative records.
    pub after: UserCounters,
}

impl CounterReconciliation {
    /// Whether the stored counters disagreed with the records.
    #[must_use]
    pub fn drifted(&self) -> bool {
        self.before != self.after
    }
}
