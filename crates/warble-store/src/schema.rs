//! Column family layout.

/// Column family names.
pub mod cf {
    /// User documents keyed by user id.
    pub const USERS: &str = "users";
    /// Follow edges keyed by follower id then followee id.
    pub const FOLLOW_EDGES: &str = "follow_edges";
    /// Edge index keyed by followee id then follower id.
    pub const FOLLOW_EDGES_BY_FOLLOWEE: &str = "follow_edges_by_followee";
    /// Post documents keyed by post id.
    pub const POSTS: &str = "posts";
    /// Post index keyed by author id then post id.
    pub const POSTS_BY_AUTHOR: &str = "posts_by_author";
    /// Comment documents keyed by post id then comment id.
    pub const COMMENTS: &str = "comments";
    /// Notification documents keyed by notification id.
    pub const NOTIFICATIONS: &str = "notifications";
    /// Notification index keyed by recipient id then notification id.
    pub const NOTIFICATIONS_BY_USER: &str = "notifications_by_user";
    /// Little-endian i64 counters keyed by entity id and field tag.
    pub const COUNTERS: &str = "counters";
}

/// All column families the store opens.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::FOLLOW_EDGES,
        cf::FOLLOW_EDGES_BY_FOLLOWEE,
        cf::POSTS,
        cf::POSTS_BY_AUTHOR,
        cf::COMMENTS,
        cf::NOTIFICATIONS,
        cf::NOTIFICATIONS_BY_USER,
        cf::COUNTERS,
    ]
}
