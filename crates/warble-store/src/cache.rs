//! User cache contract and in-memory implementation.
//!
//! The request layer (outside this pipeline) writes denormalized user state
//! into a cache so actors read their own writes immediately; fan-out only
//! ever reads it, falling back to the store on a miss.

use std::collections::HashMap;

use parking_lot::RwLock;
use warble_core::UserId;

use crate::types::UserDocument;

/// Read-only user lookup consumed by notification fan-out.
pub trait UserCache: Send + Sync {
    /// Returns the cached user document, if present.
    fn get_user(&self, user_id: &UserId) -> Option<UserDocument>;
}

/// In-memory user cache.
#[derive(Default)]
pub struct MemoryUserCache {
    entries: RwLock<HashMap<UserId, UserDocument>>,
}

impl MemoryUserCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts or replaces a user entry.
    pub fn insert(&self, user: UserDocument) {
        self.entries.write().insert(user.user_id, user);
    }

    /// Removes an entry, returning whether it existed.
    pub fn remove(&self, user_id: &UserId) -> bool {
        self.entries.write().remove(user_id).is_some()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl UserCache for MemoryUserCache {
    fn get_user(&self, user_id: &UserId) -> Option<UserDocument> {
        self.entries.read().get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PreferenceFlags;
    use chrono::Utc;

    fn user(username: &str) -> UserDocument {
        UserDocument {
            user_id: UserId::generate(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            avatar_color: "teal".to_string(),
            notifications: PreferenceFlags::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_get() {
        let cache = MemoryUserCache::new();
        let doc = user("mika");
        let id = doc.user_id;

        cache.insert(doc.clone());
        assert_eq!(cache.get_user(&id), Some(doc));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn miss_returns_none() {
        let cache = MemoryUserCache::new();
        assert!(cache.get_user(&UserId::generate()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_replaces_existing() {
        let cache = MemoryUserCache::new();
        let mut doc = user("mika");
        let id = doc.user_id;
        cache.insert(doc.clone());

        doc.email = "new@example.com".to_string();
        cache.insert(doc);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_user(&id).unwrap().email, "new@example.com");
    }

    #[test]
    fn remove_and_clear() {
        let cache = MemoryUserCache::new();
        let doc = user("mika");
        let id = doc.user_id;
        cache.insert(doc);

        assert!(cache.remove(&id));
        assert!(!cache.remove(&id));

        cache.insert(user("noor"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
