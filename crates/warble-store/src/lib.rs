//! Persistent storage for the warble pipeline.
//!
//! The [`Store`] trait is the document-store contract the persistence
//! services run against: existence-checked inserts that carry their counter
//! updates in the same atomic batch, guarded deletes, and the aggregate
//! reads the feed and inbox surfaces use. [`RocksStore`] is the embedded
//! RocksDB implementation; [`UserCache`] is the read-only cache contract
//! fan-out consults before falling back to the store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use cache::{MemoryUserCache, UserCache};
pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{
    CommentDocument, CommentNameList, CounterField, CounterReconciliation, FollowEdge,
    FollowerView, NotificationCategory, NotificationDocument, NotificationKind, PostDocument,
    PostFilter, PostUpdate, PreferenceFlags, UserCounters, UserDocument,
};

use warble_core::{NotificationId, PostId, UserId};

/// Storage operations used by the persistence services.
///
/// Counter fields are never read-modify-written: every `insert_*` and
/// `delete_*` that implies a counter change must apply the content write
/// and the increment in one atomic batch, and must skip both when the
/// guarded existence check says the work already happened. That pair of
/// rules is what makes replayed job payloads harmless.
pub trait Store: Send + Sync {
    // ===== Users =====

    /// Inserts or replaces a user document.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_user(&self, user: &UserDocument) -> Result<()>;

    /// Fetches a user document.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserDocument>>;

    /// Reads a user's counters; missing counters read as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn user_counters(&self, user_id: &UserId) -> Result<UserCounters>;

    // ===== Follow edges =====

    /// Inserts a follow edge and increments the follower's following count
    /// and the followee's follower count, all in one batch. Returns `false`
    /// without writing anything when an edge for the pair already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the batch write fails.
    fn insert_follow_edge(&self, edge: &FollowEdge) -> Result<bool>;

    /// Deletes the edge for the ordered pair and decrements both counters
    /// in one batch. Returns `false` when no edge exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the batch write fails.
    fn delete_follow_edge(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool>;

    /// Returns whether an edge exists for the ordered pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn follow_edge_exists(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool>;

    /// Users following `user_id`, joined with their documents and counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn followers_of(&self, user_id: &UserId) -> Result<Vec<FollowerView>>;

    /// Users `user_id` follows, joined with their documents and counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn following_of(&self, user_id: &UserId) -> Result<Vec<FollowerView>>;

    /// Ids of the users `user_id` follows.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn followee_ids(&self, user_id: &UserId) -> Result<Vec<UserId>>;

    // ===== Posts =====

    /// Inserts a post and increments the author's post counter in one
    /// batch. Returns `false` when the post id already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the batch write fails.
    fn insert_post(&self, post: &PostDocument) -> Result<bool>;

    /// Fetches a post.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_post(&self, post_id: &PostId) -> Result<Option<PostDocument>>;

    /// Replaces a post's mutable content fields. Returns `false` when the
    /// post does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    fn update_post(&self, post_id: &PostId, update: &PostUpdate) -> Result<bool>;

    /// Deletes a post and decrements its author's post counter in one
    /// batch. Returns `false` when the post does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the batch write fails.
    fn delete_post(&self, post_id: &PostId) -> Result<bool>;

    /// Newest-first page of posts passing the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn posts_page(
        &self,
        filter: PostFilter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PostDocument>>;

    /// Total number of stored posts.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn posts_count(&self) -> Result<usize>;

    /// Number of comments recorded against a post.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn post_comment_count(&self, post_id: &PostId) -> Result<i64>;

    // ===== Comments =====

    /// Inserts a comment and increments the post's comment counter in one
    /// batch. Returns `false` when the comment already exists on the post.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the batch write fails.
    fn insert_comment(&self, comment: &CommentDocument) -> Result<bool>;

    /// Oldest-first comments on a post.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn comments_for_post(&self, post_id: &PostId) -> Result<Vec<CommentDocument>>;

    /// Distinct commenter usernames on a post plus the total comment count.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn comment_names_for_post(&self, post_id: &PostId) -> Result<CommentNameList>;

    // ===== Notifications =====

    /// Inserts a notification record. Returns `false` when the id already
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the batch write fails.
    fn insert_notification(&self, notification: &NotificationDocument) -> Result<bool>;

    /// Fetches a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_notification(
        &self,
        notification_id: &NotificationId,
    ) -> Result<Option<NotificationDocument>>;

    /// Marks a notification read. Returns `false` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    fn mark_notification_read(&self, notification_id: &NotificationId) -> Result<bool>;

    /// Deletes a notification. Returns `false` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the batch write fails.
    fn delete_notification(&self, notification_id: &NotificationId) -> Result<bool>;

    /// Newest-first notification inbox for a recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn notifications_for(&self, user_id: &UserId) -> Result<Vec<NotificationDocument>>;

    // ===== Maintenance =====

    /// Recounts a user's edges and posts from the authoritative records and
    /// overwrites the stored counters, reporting values before and after.
    /// Operator-invoked repair; nothing in the pipeline schedules it.
    ///
    /// # Errors
    ///
    /// Returns an error if a scan or the batch write fails.
    fn reconcile_user_counters(&self, user_id: &UserId) -> Result<CounterReconciliation>;
}
