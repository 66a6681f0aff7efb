//! Binary key construction for the column families.
//!
//! Composite keys concatenate raw UUID bytes, so a prefix scan over the
//! first id walks exactly that entity's records. The follow-edge key is the
//! ordered (follower, followee) pair itself, which is what makes "at most
//! one edge per pair" a structural property rather than a checked one.

use uuid::Uuid;
use warble_core::{CommentId, NotificationId, PostId, UserId};

use crate::types::CounterField;

/// Key for a user document.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Key for a follow edge: follower, then followee.
#[must_use]
pub fn follow_edge_key(follower_id: &UserId, followee_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(follower_id.as_bytes());
    key.extend_from_slice(followee_id.as_bytes());
    key
}

/// Prefix of every edge keyed under the given follower.
#[must_use]
pub fn follower_prefix(follower_id: &UserId) -> Vec<u8> {
    follower_id.as_bytes().to_vec()
}

/// Index key for a follow edge: followee, then follower.
#[must_use]
pub fn followee_index_key(followee_id: &UserId, follower_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(followee_id.as_bytes());
    key.extend_from_slice(follower_id.as_bytes());
    key
}

/// Prefix of every index entry keyed under the given followee.
#[must_use]
pub fn followee_prefix(followee_id: &UserId) -> Vec<u8> {
    followee_id.as_bytes().to_vec()
}

/// Extracts the follower id from a followee index key.
///
/// # Panics
///
/// Panics if the key does not carry two UUIDs.
#[must_use]
pub fn extract_follower_from_index(key: &[u8]) -> UserId {
    let bytes: [u8; 16] = key[16..32].try_into().expect("index key carries two uuids");
    UserId::from_uuid(Uuid::from_bytes(bytes))
}

/// Key for a post document.
#[must_use]
pub fn post_key(post_id: &PostId) -> Vec<u8> {
    post_id.as_bytes().to_vec()
}

/// Index key for a post under its author.
#[must_use]
pub fn author_post_key(author_id: &UserId, post_id: &PostId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(author_id.as_bytes());
    key.extend_from_slice(post_id.as_bytes());
    key
}

/// Prefix of every post index entry under the given author.
#[must_use]
pub fn author_posts_prefix(author_id: &UserId) -> Vec<u8> {
    author_id.as_bytes().to_vec()
}

/// Key for a comment: post, then comment.
#[must_use]
pub fn comment_key(post_id: &PostId, comment_id: &CommentId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(post_id.as_bytes());
    key.extend_from_slice(comment_id.as_bytes());
    key
}

/// Prefix of every comment keyed under the given post.
#[must_use]
pub fn post_comments_prefix(post_id: &PostId) -> Vec<u8> {
    post_id.as_bytes().to_vec()
}

/// Key for a notification document.
#[must_use]
pub fn notification_key(notification_id: &NotificationId) -> Vec<u8> {
    notification_id.as_bytes().to_vec()
}

/// Index key for a notification under its recipient.
#[must_use]
pub fn user_notification_key(user_to: &UserId, notification_id: &NotificationId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_to.as_bytes());
    key.extend_from_slice(notification_id.as_bytes());
    key
}

/// Prefix of every notification index entry under the given recipient.
#[must_use]
pub fn user_notifications_prefix(user_to: &UserId) -> Vec<u8> {
    user_to.as_bytes().to_vec()
}

/// Extracts the notification id from a recipient index key.
///
/// # Panics
///
/// Panics if the key does not carry two UUIDs.
#[must_use]
pub fn extract_notification_from_index(key: &[u8]) -> NotificationId {
    let bytes: [u8; 16] = key[16..32].try_into().expect("index key carries two uuids");
    NotificationId::from_uuid(Uuid::from_bytes(bytes))
}

/// Key for one counter field of one entity.
#[must_use]
pub fn counter_key(entity: &[u8; 16], field: CounterField) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.extend_from_slice(entity);
    key.push(field.tag());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_concatenates_pair_in_order() {
        let follower = UserId::generate();
        let followee = UserId::generate();
        let key = follow_edge_key(&follower, &followee);
        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], follower.as_bytes());
        assert_eq!(&key[16..], followee.as_bytes());
    }

    #[test]
    fn follower_prefix_matches_edge_keys() {
        let follower = UserId::generate();
        let followee = UserId::generate();
        let key = follow_edge_key(&follower, &followee);
        assert!(key.starts_with(&follower_prefix(&follower)));
    }

    #[test]
    fn followee_index_roundtrip() {
        let follower = UserId::generate();
        let followee = UserId::generate();
        let key = followee_index_key(&followee, &follower);
        assert!(key.starts_with(&followee_prefix(&followee)));
        assert_eq!(extract_follower_from_index(&key), follower);
    }

    #[test]
    fn notification_index_roundtrip() {
        let user = UserId::generate();
        let id = NotificationId::generate();
        let key = user_notification_key(&user, &id);
        assert!(key.starts_with(&user_notifications_prefix(&user)));
        assert_eq!(extract_notification_from_index(&key), id);
    }

    #[test]
    fn comment_key_scoped_by_post() {
        let post = PostId::generate();
        let comment = CommentId::generate();
        let key = comment_key(&post, &comment);
        assert_eq!(key.len(), 32);
        assert!(key.starts_with(&post_comments_prefix(&post)));
    }

    #[test]
    fn counter_keys_differ_per_field() {
        let user = UserId::generate();
        let followers = counter_key(user.as_bytes(), CounterField::Followers);
        let following = counter_key(user.as_bytes(), CounterField::Following);
        assert_eq!(followers.len(), 17);
        assert_ne!(followers, following);
        assert_eq!(&followers[..16], user.as_bytes());
    }
}
