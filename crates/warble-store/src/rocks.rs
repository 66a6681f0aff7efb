//! RocksDB-backed implementation of the [`Store`] trait.
//!
//! Counters live in their own column family as little-endian i64 values and
//! are mutated through an associative add merge operator, which lets a
//! content write and its counter increments share one [`WriteBatch`].
//! Check-then-write mutations serialize on an internal mutex so a replayed
//! payload cannot slip between another worker's existence check and its
//! batch; reads take no lock.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MergeOperands, MultiThreaded, Options, WriteBatch,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use warble_core::{NotificationId, PostId, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{self, cf};
use crate::types::{
    CommentDocument, CommentNameList, CounterField, CounterReconciliation, FollowEdge,
    FollowerView, NotificationDocument, PostDocument, PostFilter, PostUpdate, UserCounters,
    UserDocument,
};
use crate::Store;

type Db = DBWithThreadMode<MultiThreaded>;

/// RocksDB-backed store.
pub struct RocksStore {
    db: Arc<Db>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors: Vec<ColumnFamilyDescriptor> = schema::all_column_families()
            .into_iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                if name == cf::COUNTERS {
                    cf_opts.set_merge_operator_associative("add_i64", add_i64);
                }
                ColumnFamilyDescriptor::new(name, cf_opts)
            })
            .collect();

        let db = Db::open_cf_descriptors(&opts, path, descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("missing column family: {name}")))
    }

    fn counter_value(&self, entity: &[u8; 16], field: CounterField) -> Result<i64> {
        let counters = self.cf(cf::COUNTERS)?;
        let value = self
            .db
            .get_cf(&counters, keys::counter_key(entity, field))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(value.as_deref().map_or(0, decode_i64))
    }

    fn count_prefix(&self, family: &Arc<BoundColumnFamily<'_>>, prefix: &[u8]) -> Result<usize> {
        let mut count = 0;
        for item in self
            .db
            .iterator_cf(family, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, _value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn get_follow_edge(
        &self,
        follower_id: &UserId,
        followee_id: &UserId,
    ) -> Result<Option<FollowEdge>> {
        let edges = self.cf(cf::FOLLOW_EDGES)?;
        self.db
            .get_cf(&edges, keys::follow_edge_key(follower_id, followee_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }

    fn follower_view(
        &self,
        user_id: &UserId,
        followed_at: DateTime<Utc>,
    ) -> Result<Option<FollowerView>> {
        // Edges whose user document is gone are skipped rather than surfaced
        // as half-empty rows.
        let Some(user) = self.get_user(user_id)? else {
            return Ok(None);
        };
        let counters = self.user_counters(user_id)?;
        Ok(Some(FollowerView {
            user_id: *user_id,
            username: user.username,
            avatar_color: user.avatar_color,
            followers_count: counters.followers_count,
            following_count: counters.following_count,
            posts_count: counters.posts_count,
            followed_at,
        }))
    }
}

impl Store for RocksStore {
    // ===== Users =====

    fn put_user(&self, user: &UserDocument) -> Result<()> {
        let users = self.cf(cf::USERS)?;
        self.db
            .put_cf(&users, keys::user_key(&user.user_id), serialize(user)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<UserDocument>> {
        let users = self.cf(cf::USERS)?;
        self.db
            .get_cf(&users, keys::user_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }

    fn user_counters(&self, user_id: &UserId) -> Result<UserCounters> {
        Ok(UserCounters {
            followers_count: self.counter_value(user_id.as_bytes(), CounterField::Followers)?,
            following_count: self.counter_value(user_id.as_bytes(), CounterField::Following)?,
            posts_count: self.counter_value(user_id.as_bytes(), CounterField::Posts)?,
        })
    }

    // ===== Follow edges =====

    fn insert_follow_edge(&self, edge: &FollowEdge) -> Result<bool> {
        let edges = self.cf(cf::FOLLOW_EDGES)?;
        let index = self.cf(cf::FOLLOW_EDGES_BY_FOLLOWEE)?;
        let counters = self.cf(cf::COUNTERS)?;
        let key = keys::follow_edge_key(&edge.follower_id, &edge.followee_id);

        let _guard = self.write_lock.lock();
        let exists = self
            .db
            .get_cf(&edges, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if exists {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&edges, &key, serialize(edge)?);
        batch.put_cf(
            &index,
            keys::followee_index_key(&edge.followee_id, &edge.follower_id),
            [],
        );
        batch.merge_cf(
            &counters,
            keys::counter_key(edge.follower_id.as_bytes(), CounterField::Following),
            1i64.to_le_bytes(),
        );
        batch.merge_cf(
            &counters,
            keys::counter_key(edge.followee_id.as_bytes(), CounterField::Followers),
            1i64.to_le_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn delete_follow_edge(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool> {
        let edges = self.cf(cf::FOLLOW_EDGES)?;
        let index = self.cf(cf::FOLLOW_EDGES_BY_FOLLOWEE)?;
        let counters = self.cf(cf::COUNTERS)?;
        let key = keys::follow_edge_key(follower_id, followee_id);

        let _guard = self.write_lock.lock();
        let exists = self
            .db
            .get_cf(&edges, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if !exists {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(&edges, &key);
        batch.delete_cf(&index, keys::followee_index_key(followee_id, follower_id));
        batch.merge_cf(
            &counters,
            keys::counter_key(follower_id.as_bytes(), CounterField::Following),
            (-1i64).to_le_bytes(),
        );
        batch.merge_cf(
            &counters,
            keys::counter_key(followee_id.as_bytes(), CounterField::Followers),
            (-1i64).to_le_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn follow_edge_exists(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool> {
        Ok(self.get_follow_edge(follower_id, followee_id)?.is_some())
    }

    fn followers_of(&self, user_id: &UserId) -> Result<Vec<FollowerView>> {
        let index = self.cf(cf::FOLLOW_EDGES_BY_FOLLOWEE)?;
        let prefix = keys::followee_prefix(user_id);
        let mut views = Vec::new();
        for item in self
            .db
            .iterator_cf(&index, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let follower_id = keys::extract_follower_from_index(&key);
            let Some(edge) = self.get_follow_edge(&follower_id, user_id)? else {
                continue;
            };
            if let Some(view) = self.follower_view(&follower_id, edge.created_at)? {
                views.push(view);
            }
        }
        Ok(views)
    }

    fn following_of(&self, user_id: &UserId) -> Result<Vec<FollowerView>> {
        let edges = self.cf(cf::FOLLOW_EDGES)?;
        let prefix = keys::follower_prefix(user_id);
        let mut views = Vec::new();
        for item in self
            .db
            .iterator_cf(&edges, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let edge: FollowEdge = deserialize(&value)?;
            if let Some(view) = self.follower_view(&edge.followee_id, edge.created_at)? {
                views.push(view);
            }
        }
        Ok(views)
    }

    fn followee_ids(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        let edges = self.cf(cf::FOLLOW_EDGES)?;
        let prefix = keys::follower_prefix(user_id);
        let mut ids = Vec::new();
        for item in self
            .db
            .iterator_cf(&edges, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let edge: FollowEdge = deserialize(&value)?;
            ids.push(edge.followee_id);
        }
        Ok(ids)
    }

    // ===== Posts =====

    fn insert_post(&self, post: &PostDocument) -> Result<bool> {
        let posts = self.cf(cf::POSTS)?;
        let index = self.cf(cf::POSTS_BY_AUTHOR)?;
        let counters = self.cf(cf::COUNTERS)?;
        let key = keys::post_key(&post.post_id);

        let _guard = self.write_lock.lock();
        let exists = self
            .db
            .get_cf(&posts, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if exists {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&posts, &key, serialize(post)?);
        batch.put_cf(
            &index,
            keys::author_post_key(&post.author_id, &post.post_id),
            [],
        );
        batch.merge_cf(
            &counters,
            keys::counter_key(post.author_id.as_bytes(), CounterField::Posts),
            1i64.to_le_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn get_post(&self, post_id: &PostId) -> Result<Option<PostDocument>> {
        let posts = self.cf(cf::POSTS)?;
        self.db
            .get_cf(&posts, keys::post_key(post_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }

    fn update_post(&self, post_id: &PostId, update: &PostUpdate) -> Result<bool> {
        let posts = self.cf(cf::POSTS)?;
        let key = keys::post_key(post_id);

        let _guard = self.write_lock.lock();
        let Some(bytes) = self
            .db
            .get_cf(&posts, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(false);
        };
        let mut post: PostDocument = deserialize(&bytes)?;
        post.apply_update(update);
        self.db
            .put_cf(&posts, &key, serialize(&post)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn delete_post(&self, post_id: &PostId) -> Result<bool> {
        let posts = self.cf(cf::POSTS)?;
        let index = self.cf(cf::POSTS_BY_AUTHOR)?;
        let counters = self.cf(cf::COUNTERS)?;
        let key = keys::post_key(post_id);

        let _guard = self.write_lock.lock();
        let Some(bytes) = self
            .db
            .get_cf(&posts, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(false);
        };
        let post: PostDocument = deserialize(&bytes)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&posts, &key);
        batch.delete_cf(&index, keys::author_post_key(&post.author_id, post_id));
        batch.merge_cf(
            &counters,
            keys::counter_key(post.author_id.as_bytes(), CounterField::Posts),
            (-1i64).to_le_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn posts_page(
        &self,
        filter: PostFilter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PostDocument>> {
        let posts = self.cf(cf::POSTS)?;
        let mut matching = Vec::new();
        for item in self.db.iterator_cf(&posts, IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let post: PostDocument = deserialize(&value)?;
            if filter.matches(&post) {
                matching.push(post);
            }
        }
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching.into_iter().skip(skip).take(limit).collect())
    }

    fn posts_count(&self) -> Result<usize> {
        let posts = self.cf(cf::POSTS)?;
        let mut count = 0;
        for item in self.db.iterator_cf(&posts, IteratorMode::Start) {
            item.map_err(|e| StoreError::Database(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    fn post_comment_count(&self, post_id: &PostId) -> Result<i64> {
        self.counter_value(post_id.as_bytes(), CounterField::Comments)
    }

    // ===== Comments =====

    fn insert_comment(&self, comment: &CommentDocument) -> Result<bool> {
        let comments = self.cf(cf::COMMENTS)?;
        let counters = self.cf(cf::COUNTERS)?;
        let key = keys::comment_key(&comment.post_id, &comment.comment_id);

        let _guard = self.write_lock.lock();
        let exists = self
            .db
            .get_cf(&comments, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if exists {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&comments, &key, serialize(comment)?);
        batch.merge_cf(
            &counters,
            keys::counter_key(comment.post_id.as_bytes(), CounterField::Comments),
            1i64.to_le_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn comments_for_post(&self, post_id: &PostId) -> Result<Vec<CommentDocument>> {
        let comments = self.cf(cf::COMMENTS)?;
        let prefix = keys::post_comments_prefix(post_id);
        let mut found = Vec::new();
        for item in self
            .db
            .iterator_cf(&comments, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            found.push(deserialize::<CommentDocument>(&value)?);
        }
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    fn comment_names_for_post(&self, post_id: &PostId) -> Result<CommentNameList> {
        let mut names = BTreeSet::new();
        let mut count = 0;
        for comment in self.comments_for_post(post_id)? {
            names.insert(comment.username);
            count += 1;
        }
        Ok(CommentNameList {
            names: names.into_iter().collect(),
            count,
        })
    }

    // ===== Notifications =====

    fn insert_notification(&self, notification: &NotificationDocument) -> Result<bool> {
        let notifications = self.cf(cf::NOTIFICATIONS)?;
        let index = self.cf(cf::NOTIFICATIONS_BY_USER)?;
        let key = keys::notification_key(&notification.notification_id);

        let _guard = self.write_lock.lock();
        let exists = self
            .db
            .get_cf(&notifications, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if exists {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&notifications, &key, serialize(notification)?);
        batch.put_cf(
            &index,
            keys::user_notification_key(&notification.user_to, &notification.notification_id),
            [],
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn get_notification(
        &self,
        notification_id: &NotificationId,
    ) -> Result<Option<NotificationDocument>> {
        let notifications = self.cf(cf::NOTIFICATIONS)?;
        self.db
            .get_cf(&notifications, keys::notification_key(notification_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }

    fn mark_notification_read(&self, notification_id: &NotificationId) -> Result<bool> {
        let notifications = self.cf(cf::NOTIFICATIONS)?;
        let key = keys::notification_key(notification_id);

        let _guard = self.write_lock.lock();
        let Some(bytes) = self
            .db
            .get_cf(&notifications, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(false);
        };
        let mut doc: NotificationDocument = deserialize(&bytes)?;
        if !doc.read {
            doc.read = true;
            self.db
                .put_cf(&notifications, &key, serialize(&doc)?)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        Ok(true)
    }

    fn delete_notification(&self, notification_id: &NotificationId) -> Result<bool> {
        let notifications = self.cf(cf::NOTIFICATIONS)?;
        let index = self.cf(cf::NOTIFICATIONS_BY_USER)?;
        let key = keys::notification_key(notification_id);

        let _guard = self.write_lock.lock();
        let Some(bytes) = self
            .db
            .get_cf(&notifications, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(false);
        };
        let doc: NotificationDocument = deserialize(&bytes)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&notifications, &key);
        batch.delete_cf(
            &index,
            keys::user_notification_key(&doc.user_to, notification_id),
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn notifications_for(&self, user_id: &UserId) -> Result<Vec<NotificationDocument>> {
        let index = self.cf(cf::NOTIFICATIONS_BY_USER)?;
        let prefix = keys::user_notifications_prefix(user_id);
        let mut found = Vec::new();
        for item in self
            .db
            .iterator_cf(&index, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let id = keys::extract_notification_from_index(&key);
            if let Some(doc) = self.get_notification(&id)? {
                found.push(doc);
            }
        }
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    // ===== Maintenance =====

    fn reconcile_user_counters(&self, user_id: &UserId) -> Result<CounterReconciliation> {
        let edges = self.cf(cf::FOLLOW_EDGES)?;
        let index = self.cf(cf::FOLLOW_EDGES_BY_FOLLOWEE)?;
        let author_index = self.cf(cf::POSTS_BY_AUTHOR)?;
        let counters = self.cf(cf::COUNTERS)?;

        // Hold the gate so the recount and the overwrite see one state.
        let _guard = self.write_lock.lock();
        let before = self.user_counters(user_id)?;
        let after = UserCounters {
            followers_count: to_i64(self.count_prefix(&index, &keys::followee_prefix(user_id))?),
            following_count: to_i64(self.count_prefix(&edges, &keys::follower_prefix(user_id))?),
            posts_count: to_i64(
                self.count_prefix(&author_index, &keys::author_posts_prefix(user_id))?,
            ),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &counters,
            keys::counter_key(user_id.as_bytes(), CounterField::Followers),
            after.followers_count.to_le_bytes(),
        );
        batch.put_cf(
            &counters,
            keys::counter_key(user_id.as_bytes(), CounterField::Following),
            after.following_count.to_le_bytes(),
        );
        batch.put_cf(
            &counters,
            keys::counter_key(user_id.as_bytes(), CounterField::Posts),
            after.posts_count.to_le_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(CounterReconciliation { before, after })
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_i64(bytes: &[u8]) -> i64 {
    bytes.try_into().map_or(0, i64::from_le_bytes)
}

fn to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn add_i64(_key: &[u8], existing: Option<&[u8]>, operands: &MergeOperands) -> Option<Vec<u8>> {
    let mut total = existing.map_or(0, decode_i64);
    for operand in operands {
        total += decode_i64(operand);
    }
    Some(total.to_le_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NotificationKind, PreferenceFlags};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;
    use uuid::Uuid;
    use warble_core::{CommentId, EdgeId};

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn test_user(username: &str) -> UserDocument {
        UserDocument {
            user_id: UserId::generate(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            avatar_color: "coral".to_string(),
            notifications: PreferenceFlags::default(),
            created_at: base_time(),
        }
    }

    fn edge_between(follower: &UserDocument, followee: &UserDocument) -> FollowEdge {
        FollowEdge {
            edge_id: EdgeId::generate(),
            follower_id: follower.user_id,
            followee_id: followee.user_id,
            created_at: base_time(),
        }
    }

    fn test_post(author: &UserDocument, text: &str, offset_secs: i64) -> PostDocument {
        PostDocument {
            post_id: PostId::generate(),
            author_id: author.user_id,
            username: author.username.clone(),
            text: text.to_string(),
            bg_color: "#ffffff".to_string(),
            privacy: "public".to_string(),
            feelings: String::new(),
            gif_url: String::new(),
            img_id: String::new(),
            img_version: String::new(),
            video_id: String::new(),
            created_at: base_time() + Duration::seconds(offset_secs),
        }
    }

    fn test_comment(
        post: &PostDocument,
        author: &UserDocument,
        text: &str,
        offset_secs: i64,
    ) -> CommentDocument {
        CommentDocument {
            comment_id: CommentId::generate(),
            post_id: post.post_id,
            author_id: author.user_id,
            username: author.username.clone(),
            avatar_color: author.avatar_color.clone(),
            text: text.to_string(),
            created_at: base_time() + Duration::seconds(offset_secs),
        }
    }

    fn test_notification(
        from: &UserDocument,
        to: &UserDocument,
        offset_secs: i64,
    ) -> NotificationDocument {
        NotificationDocument {
            notification_id: warble_core::NotificationId::generate(),
            user_from: from.user_id,
            user_to: to.user_id,
            kind: NotificationKind::Follows,
            message: format!("{} is now following you.", from.username),
            entity_id: *from.user_id.as_uuid(),
            created_item_id: Uuid::new_v4(),
            read: false,
            comment_text: String::new(),
            post_excerpt: String::new(),
            img_id: String::new(),
            img_version: String::new(),
            gif_url: String::new(),
            created_at: base_time() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn put_and_get_user() {
        let (store, _dir) = create_test_store();
        let user = test_user("mika");

        store.put_user(&user).unwrap();
        assert_eq!(store.get_user(&user.user_id).unwrap(), Some(user));
    }

    #[test]
    fn missing_user_is_none() {
        let (store, _dir) = create_test_store();
        assert!(store.get_user(&UserId::generate()).unwrap().is_none());
    }

    #[test]
    fn fresh_counters_are_zero() {
        let (store, _dir) = create_test_store();
        let counters = store.user_counters(&UserId::generate()).unwrap();
        assert_eq!(counters, UserCounters::default());
    }

    #[test]
    fn insert_follow_edge_updates_both_counters() {
        let (store, _dir) = create_test_store();
        let alice = test_user("alice");
        let bob = test_user("bob");
        store.put_user(&alice).unwrap();
        store.put_user(&bob).unwrap();

        let inserted = store.insert_follow_edge(&edge_between(&alice, &bob)).unwrap();
        assert!(inserted);
        assert!(store
            .follow_edge_exists(&alice.user_id, &bob.user_id)
            .unwrap());

        assert_eq!(
            store.user_counters(&alice.user_id).unwrap().following_count,
            1
        );
        assert_eq!(store.user_counters(&bob.user_id).unwrap().followers_count, 1);

        let followers = store.followers_of(&bob.user_id).unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "alice");
        assert_eq!(followers[0].following_count, 1);

        let following = store.following_of(&alice.user_id).unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].username, "bob");
        assert_eq!(following[0].followers_count, 1);
    }

    #[test]
    fn duplicate_follow_edge_is_noop() {
        let (store, _dir) = create_test_store();
        let alice = test_user("alice");
        let bob = test_user("bob");
        store.put_user(&alice).unwrap();
        store.put_user(&bob).unwrap();

        assert!(store.insert_follow_edge(&edge_between(&alice, &bob)).unwrap());
        // A replay mints a fresh edge id for the same pair.
        assert!(!store.insert_follow_edge(&edge_between(&alice, &bob)).unwrap());

        assert_eq!(store.user_counters(&bob.user_id).unwrap().followers_count, 1);
        assert_eq!(
            store.user_counters(&alice.user_id).unwrap().following_count,
            1
        );
        assert_eq!(store.followers_of(&bob.user_id).unwrap().len(), 1);
    }

    #[test]
    fn delete_follow_edge_reverses_counters() {
        let (store, _dir) = create_test_store();
        let alice = test_user("alice");
        let bob = test_user("bob");
        store.put_user(&alice).unwrap();
        store.put_user(&bob).unwrap();
        store.insert_follow_edge(&edge_between(&alice, &bob)).unwrap();

        assert!(store
            .delete_follow_edge(&alice.user_id, &bob.user_id)
            .unwrap());
        assert!(!store
            .follow_edge_exists(&alice.user_id, &bob.user_id)
            .unwrap());
        assert_eq!(store.user_counters(&bob.user_id).unwrap().followers_count, 0);
        assert_eq!(
            store.user_counters(&alice.user_id).unwrap().following_count,
            0
        );

        // A second delete must not drive the counters negative.
        assert!(!store
            .delete_follow_edge(&alice.user_id, &bob.user_id)
            .unwrap());
        assert_eq!(store.user_counters(&bob.user_id).unwrap().followers_count, 0);
    }

    #[test]
    fn followee_ids_lists_targets() {
        let (store, _dir) = create_test_store();
        let alice = test_user("alice");
        let bob = test_user("bob");
        let cara = test_user("cara");
        for user in [&alice, &bob, &cara] {
            store.put_user(user).unwrap();
        }
        store.insert_follow_edge(&edge_between(&alice, &bob)).unwrap();
        store.insert_follow_edge(&edge_between(&alice, &cara)).unwrap();

        let ids = store.followee_ids(&alice.user_id).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&bob.user_id));
        assert!(ids.contains(&cara.user_id));
        assert!(store.followee_ids(&bob.user_id).unwrap().is_empty());
    }

    #[test]
    fn follower_views_skip_users_without_documents() {
        let (store, _dir) = create_test_store();
        let alice = test_user("alice");
        let ghost = test_user("ghost");
        store.put_user(&alice).unwrap();
        // ghost's document is never stored.
        store.insert_follow_edge(&edge_between(&ghost, &alice)).unwrap();

        assert!(store.followers_of(&alice.user_id).unwrap().is_empty());
        assert_eq!(
            store.user_counters(&alice.user_id).unwrap().followers_count,
            1
        );
    }

    #[test]
    fn insert_post_increments_author_count() {
        let (store, _dir) = create_test_store();
        let author = test_user("dana");
        store.put_user(&author).unwrap();
        let post = test_post(&author, "first!", 0);

        assert!(store.insert_post(&post).unwrap());
        assert!(!store.insert_post(&post).unwrap());
        assert_eq!(store.user_counters(&author.user_id).unwrap().posts_count, 1);
        assert_eq!(store.get_post(&post.post_id).unwrap(), Some(post));
    }

    #[test]
    fn update_post_replaces_content() {
        let (store, _dir) = create_test_store();
        let author = test_user("dana");
        let post = test_post(&author, "draft", 0);
        store.insert_post(&post).unwrap();

        let update = PostUpdate {
            text: "final".to_string(),
            bg_color: "#222222".to_string(),
            privacy: "followers".to_string(),
            feelings: "proud".to_string(),
            gif_url: String::new(),
            img_id: String::new(),
            img_version: String::new(),
            video_id: String::new(),
        };
        assert!(store.update_post(&post.post_id, &update).unwrap());

        let stored = store.get_post(&post.post_id).unwrap().unwrap();
        assert_eq!(stored.text, "final");
        assert_eq!(stored.author_id, author.user_id);
        assert_eq!(stored.created_at, post.created_at);

        assert!(!store.update_post(&PostId::generate(), &update).unwrap());
    }

    #[test]
    fn delete_post_decrements_and_guards() {
        let (store, _dir) = create_test_store();
        let author = test_user("dana");
        let post = test_post(&author, "bye", 0);
        store.insert_post(&post).unwrap();

        assert!(store.delete_post(&post.post_id).unwrap());
        assert!(store.get_post(&post.post_id).unwrap().is_none());
        assert_eq!(store.user_counters(&author.user_id).unwrap().posts_count, 0);

        assert!(!store.delete_post(&post.post_id).unwrap());
        assert_eq!(store.user_counters(&author.user_id).unwrap().posts_count, 0);
    }

    #[test]
    fn posts_page_filters_and_paginates() {
        let (store, _dir) = create_test_store();
        let author = test_user("dana");
        let plain = test_post(&author, "plain", 0);
        let mut with_gif = test_post(&author, "gif", 1);
        with_gif.gif_url = "https://example.com/cat.gif".to_string();
        let mut with_video = test_post(&author, "video", 2);
        with_video.video_id = "v-1".to_string();
        for post in [&plain, &with_gif, &with_video] {
            store.insert_post(post).unwrap();
        }

        let all = store.posts_page(PostFilter::All, 0, 10).unwrap();
        let texts: Vec<&str> = all.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["video", "gif", "plain"]);

        let images = store.posts_page(PostFilter::WithImages, 0, 10).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].text, "gif");

        let videos = store.posts_page(PostFilter::WithVideos, 0, 10).unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].text, "video");

        let second = store.posts_page(PostFilter::All, 1, 1).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].text, "gif");

        assert_eq!(store.posts_count().unwrap(), 3);
    }

    #[test]
    fn comments_flow() {
        let (store, _dir) = create_test_store();
        let author = test_user("dana");
        let zora = test_user("zora");
        let abe = test_user("abe");
        let post = test_post(&author, "discuss", 0);
        store.insert_post(&post).unwrap();

        let first = test_comment(&post, &zora, "nice", 0);
        let second = test_comment(&post, &abe, "agreed", 1);
        let third = test_comment(&post, &zora, "thanks", 2);
        assert!(store.insert_comment(&first).unwrap());
        assert!(store.insert_comment(&second).unwrap());
        assert!(store.insert_comment(&third).unwrap());
        assert!(!store.insert_comment(&first).unwrap());

        let comments = store.comments_for_post(&post.post_id).unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["nice", "agreed", "thanks"]);

        let names = store.comment_names_for_post(&post.post_id).unwrap();
        assert_eq!(names.names, vec!["abe".to_string(), "zora".to_string()]);
        assert_eq!(names.count, 3);
        assert_eq!(store.post_comment_count(&post.post_id).unwrap(), 3);
    }

    #[test]
    fn notification_crud() {
        let (store, _dir) = create_test_store();
        let alice = test_user("alice");
        let bob = test_user("bob");
        let notification = test_notification(&alice, &bob, 0);
        let id = notification.notification_id;

        assert!(store.insert_notification(&notification).unwrap());
        assert!(!store.insert_notification(&notification).unwrap());
        assert_eq!(store.get_notification(&id).unwrap(), Some(notification));

        assert!(store.mark_notification_read(&id).unwrap());
        assert!(store.get_notification(&id).unwrap().unwrap().read);
        assert!(store.mark_notification_read(&id).unwrap());

        assert!(store.delete_notification(&id).unwrap());
        assert!(store.get_notification(&id).unwrap().is_none());
        assert!(!store.delete_notification(&id).unwrap());
    }

    #[test]
    fn notifications_for_newest_first() {
        let (store, _dir) = create_test_store();
        let alice = test_user("alice");
        let bob = test_user("bob");
        let cara = test_user("cara");
        let older = test_notification(&alice, &bob, 0);
        let newer = test_notification(&cara, &bob, 5);
        let unrelated = test_notification(&alice, &cara, 1);
        store.insert_notification(&older).unwrap();
        store.insert_notification(&newer).unwrap();
        store.insert_notification(&unrelated).unwrap();

        let inbox = store.notifications_for(&bob.user_id).unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].notification_id, newer.notification_id);
        assert_eq!(inbox[1].notification_id, older.notification_id);
    }

    #[test]
    fn reconcile_repairs_drift() {
        let (store, _dir) = create_test_store();
        let alice = test_user("alice");
        let bob = test_user("bob");
        store.put_user(&alice).unwrap();
        store.put_user(&bob).unwrap();
        store.insert_follow_edge(&edge_between(&alice, &bob)).unwrap();
        store.insert_post(&test_post(&bob, "hello", 0)).unwrap();

        // Sabotage bob's follower counter directly.
        let counters = store.cf(cf::COUNTERS).unwrap();
        store
            .db
            .put_cf(
                &counters,
                keys::counter_key(bob.user_id.as_bytes(), CounterField::Followers),
                99i64.to_le_bytes(),
            )
            .unwrap();
        assert_eq!(store.user_counters(&bob.user_id).unwrap().followers_count, 99);

        let report = store.reconcile_user_counters(&bob.user_id).unwrap();
        assert!(report.drifted());
        assert_eq!(report.before.followers_count, 99);
        assert_eq!(report.after.followers_count, 1);
        assert_eq!(report.after.posts_count, 1);
        assert_eq!(store.user_counters(&bob.user_id).unwrap().followers_count, 1);

        let clean = store.reconcile_user_counters(&alice.user_id).unwrap();
        assert!(!clean.drifted());
        assert_eq!(clean.after.following_count, 1);
    }
}
