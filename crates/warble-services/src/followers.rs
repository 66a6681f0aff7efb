//! Follower-edge persistence service.

use std::sync::Arc;

use chrono::Utc;
use warble_core::{EdgeId, UserId};
use warble_store::{FollowEdge, FollowerView, Store};

use crate::error::Result;
use crate::fanout::{FanoutOutcome, FanoutRequest, NotificationFanout};

/// What applying a follow job changed.
#[derive(Debug, Clone)]
pub struct FollowApplied {
    /// Whether the edge was freshly inserted.
    pub inserted: bool,
    /// Fan-out outcome, present only for a fresh insert.
    pub fanout: Option<FanoutOutcome>,
}

/// Durable writes for follow edges and their counters.
pub struct FollowerService<S> {
    store: Arc<S>,
    fanout: Arc<NotificationFanout<S>>,
}

impl<S: Store> FollowerService<S> {
    /// Creates the service over the given store and fan-out.
    #[must_use]
    pub fn new(store: Arc<S>, fanout: Arc<NotificationFanout<S>>) -> Self {
        Self { store, fanout }
    }

    /// Applies a follow: inserts the edge and moves both counters in one
    /// batch, then fans out to the followee when the edge is fresh.
    ///
    /// Replaying the same payload stops at the existence check, so the
    /// counters move at most once per ordered pair and the fan-out fires
    /// at most once.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge write or the fan-out's recipient
    /// lookup fails.
    pub async fn add_follower(
        &self,
        follower_id: UserId,
        followee_id: UserId,
        follower_username: &str,
        edge_id: EdgeId,
    ) -> Result<FollowApplied> {
        let edge = FollowEdge {
            edge_id,
            follower_id,
            followee_id,
            created_at: Utc::now(),
        };

        let inserted = self.store.insert_follow_edge(&edge)?;
        if !inserted {
            tracing::debug!(
                follower = %follower_id,
                followee = %followee_id,
                "Follow edge already present; skipping"
            );
            return Ok(FollowApplied {
                inserted: false,
                fanout: None,
            });
        }

        tracing::info!(
            follower = %follower_id,
            followee = %followee_id,
            edge_id = %edge_id,
            "Inserted follow edge"
        );

        let outcome = self
            .fanout
            .deliver(FanoutRequest::follow(
                follower_id,
                followee_id,
                follower_username,
                edge_id,
            ))
            .await?;

        Ok(FollowApplied {
            inserted: true,
            fanout: Some(outcome),
        })
    }

    /// Removes a follow: deletes the edge and moves both counters back in
    /// one batch. A missing edge leaves everything untouched and returns
    /// `false`. No notification is produced.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the batch write fails.
    pub async fn remove_follower(&self, follower_id: UserId, followee_id: UserId) -> Result<bool> {
        let removed = self.store.delete_follow_edge(&follower_id, &followee_id)?;
        if removed {
            tracing::info!(
                follower = %follower_id,
                followee = %followee_id,
                "Removed follow edge"
            );
        } else {
            tracing::debug!(
                follower = %follower_id,
                followee = %followee_id,
                "No follow edge to remove"
            );
        }
        Ok(removed)
    }

    /// Users following `user_id`, joined with profile and counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn followers_of(&self, user_id: &UserId) -> Result<Vec<FollowerView>> {
        Ok(self.store.followers_of(user_id)?)
    }

    /// Users `user_id` follows, joined with profile and counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn following_of(&self, user_id: &UserId) -> Result<Vec<FollowerView>> {
        Ok(self.store.following_of(user_id)?)
    }

    /// Bare ids of the users `user_id` follows.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn followee_ids(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        Ok(self.store.followee_ids(user_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{job_names, JobPayload};
    use crate::workers::EmailWorker;
    use tempfile::TempDir;
    use warble_delivery::{Broadcaster, ChannelBroadcaster, MemoryMailDispatcher};
    use warble_queue::JobQueue;
    use warble_store::{MemoryUserCache, PreferenceFlags, RocksStore, UserCache, UserDocument};

    struct Fixture {
        service: FollowerService<RocksStore>,
        store: Arc<RocksStore>,
        cache: Arc<MemoryUserCache>,
        mail: Arc<MemoryMailDispatcher>,
        emails: JobQueue<JobPayload>,
        _dir: TempDir,
    }

    fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let cache = Arc::new(MemoryUserCache::new());
        let hub = Arc::new(ChannelBroadcaster::new());
        let mail = Arc::new(MemoryMailDispatcher::new());

        let emails = JobQueue::new("emails");
        emails
            .register(
                job_names::SEND_EMAIL,
                2,
                Arc::new(EmailWorker::new(mail.clone())),
            )
            .unwrap();

        let cache_dyn: Arc<dyn UserCache> = cache.clone();
        let hub_dyn: Arc<dyn Broadcaster> = hub;
        let fanout = Arc::new(NotificationFanout::new(
            store.clone(),
            cache_dyn,
            hub_dyn,
            emails.clone(),
        ));
        let service = FollowerService::new(store.clone(), fanout);

        Fixture {
            service,
            store,
            cache,
            mail,
            emails,
            _dir: dir,
        }
    }

    fn cached_user(fix: &Fixture, username: &str) -> UserId {
        let user = UserDocument {
            user_id: UserId::generate(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            avatar_color: "teal".to_string(),
            notifications: PreferenceFlags::default(),
            created_at: Utc::now(),
        };
        let id = user.user_id;
        fix.cache.insert(user);
        id
    }

    #[tokio::test]
    async fn follow_moves_both_counters_and_notifies() {
        let fix = setup();
        let follower = cached_user(&fix, "dana");
        let followee = cached_user(&fix, "noor");

        let applied = fix
            .service
            .add_follower(follower, followee, "dana", EdgeId::generate())
            .await
            .unwrap();
        assert!(applied.inserted);
        assert!(applied.fanout.unwrap().receipt().unwrap().fully_delivered());

        assert!(fix.store.follow_edge_exists(&follower, &followee).unwrap());
        assert_eq!(fix.store.user_counters(&follower).unwrap().following_count, 1);
        assert_eq!(fix.store.user_counters(&followee).unwrap().followers_count, 1);

        assert_eq!(fix.store.notifications_for(&followee).unwrap().len(), 1);
        fix.emails.await_idle().await;
        assert_eq!(fix.mail.sent_count(), 1);
    }

    #[tokio::test]
    async fn replayed_follow_is_idempotent() {
        let fix = setup();
        let follower = cached_user(&fix, "dana");
        let followee = cached_user(&fix, "noor");
        let edge_id = EdgeId::generate();

        let first = fix
            .service
            .add_follower(follower, followee, "dana", edge_id)
            .await
            .unwrap();
        assert!(first.inserted);

        let replay = fix
            .service
            .add_follower(follower, followee, "dana", edge_id)
            .await
            .unwrap();
        assert!(!replay.inserted);
        assert!(replay.fanout.is_none());

        // One edge, one counter move, one notification, one email.
        assert_eq!(fix.store.user_counters(&follower).unwrap().following_count, 1);
        assert_eq!(fix.store.user_counters(&followee).unwrap().followers_count, 1);
        assert_eq!(fix.store.notifications_for(&followee).unwrap().len(), 1);
        fix.emails.await_idle().await;
        assert_eq!(fix.mail.sent_count(), 1);
    }

    #[tokio::test]
    async fn unfollow_reverses_the_follow() {
        let fix = setup();
        let follower = cached_user(&fix, "dana");
        let followee = cached_user(&fix, "noor");

        fix.service
            .add_follower(follower, followee, "dana", EdgeId::generate())
            .await
            .unwrap();
        let removed = fix
            .service
            .remove_follower(follower, followee)
            .await
            .unwrap();
        assert!(removed);

        assert!(!fix.store.follow_edge_exists(&follower, &followee).unwrap());
        assert_eq!(fix.store.user_counters(&follower).unwrap().following_count, 0);
        assert_eq!(fix.store.user_counters(&followee).unwrap().followers_count, 0);

        // The follow notification is history, not state; it stays.
        assert_eq!(fix.store.notifications_for(&followee).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unfollow_without_edge_touches_nothing() {
        let fix = setup();
        let follower = cached_user(&fix, "dana");
        let followee = cached_user(&fix, "noor");

        let removed = fix
            .service
            .remove_follower(follower, followee)
            .await
            .unwrap();
        assert!(!removed);
        assert_eq!(fix.store.user_counters(&follower).unwrap().following_count, 0);
        assert_eq!(fix.store.user_counters(&followee).unwrap().followers_count, 0);
    }

    #[tokio::test]
    async fn follower_views_join_profiles() {
        let fix = setup();
        let follower = cached_user(&fix, "dana");
        let followee = cached_user(&fix, "noor");

        // Views join against stored profiles, so persist them too.
        for id in [follower, followee] {
            let user = fix.cache.get_user(&id).unwrap();
            fix.store.put_user(&user).unwrap();
        }

        fix.service
            .add_follower(follower, followee, "dana", EdgeId::generate())
            .await
            .unwrap();

        let followers = fix.service.followers_of(&followee).unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "dana");

        let following = fix.service.following_of(&follower).unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].username, "noor");

        assert_eq!(fix.service.followee_ids(&follower).unwrap(), vec![followee]);
    }
}
