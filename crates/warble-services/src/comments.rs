//! Comment persistence service.

use std::sync::Arc;

use warble_core::{PostId, UserId};
use warble_store::{CommentDocument, CommentNameList, Store};

use crate::error::Result;
use crate::fanout::{FanoutOutcome, FanoutRequest, FanoutSkip, NotificationFanout};

/// What applying a comment job changed.
#[derive(Debug, Clone)]
pub struct CommentApplied {
    /// Whether the comment was freshly inserted.
    pub inserted: bool,
    /// Fan-out outcome, present only for a fresh insert.
    pub fanout: Option<FanoutOutcome>,
}

/// Durable writes for comments and the notification they trigger.
pub struct CommentService<S> {
    store: Arc<S>,
    fanout: Arc<NotificationFanout<S>>,
}

impl<S: Store> CommentService<S> {
    /// Creates the service over the given store and fan-out.
    #[must_use]
    pub fn new(store: Arc<S>, fanout: Arc<NotificationFanout<S>>) -> Self {
        Self { store, fanout }
    }

    /// Applies a comment: inserts the document and bumps the post's
    /// comment counter in one batch, then notifies the post's author
    /// when the insert is fresh.
    ///
    /// The post is read after the insert to snapshot its current body
    /// and media into the notification. A post deleted between the
    /// comment request and this job keeps the comment but produces no
    /// notification.
    ///
    /// # Errors
    ///
    /// Returns an error if a store access or the fan-out's recipient
    /// lookup fails.
    pub async fn add_comment(
        &self,
        post_id: PostId,
        post_author_id: UserId,
        commenter_username: &str,
        comment: CommentDocument,
    ) -> Result<CommentApplied> {
        let inserted = self.store.insert_comment(&comment)?;
        if !inserted {
            tracing::debug!(comment_id = %comment.comment_id, "Comment already present; skipping");
            return Ok(CommentApplied {
                inserted: false,
                fanout: None,
            });
        }

        tracing::info!(
            comment_id = %comment.comment_id,
            post_id = %post_id,
            author = %comment.author_id,
            "Inserted comment"
        );

        let Some(post) = self.store.get_post(&post_id)? else {
            tracing::warn!(post_id = %post_id, "Commented post is gone; skipping notification");
            return Ok(CommentApplied {
                inserted: true,
                fanout: Some(FanoutOutcome::Skipped(FanoutSkip::SourceMissing)),
            });
        };

        let outcome = self
            .fanout
            .deliver(FanoutRequest::comment(
                post_author_id,
                commenter_username,
                &comment,
                &post,
            ))
            .await?;

        Ok(CommentApplied {
            inserted: true,
            fanout: Some(outcome),
        })
    }

    /// Comments on a post, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn comments_for_post(&self, post_id: &PostId) -> Result<Vec<CommentDocument>> {
        Ok(self.store.comments_for_post(post_id)?)
    }

    /// Distinct commenter names on a post plus the total count.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn comment_names_for_post(&self, post_id: &PostId) -> Result<CommentNameList> {
        Ok(self.store.comment_names_for_post(post_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{job_names, JobPayload};
    use crate::workers::EmailWorker;
    use chrono::Utc;
    use tempfile::TempDir;
    use warble_core::CommentId;
    use warble_delivery::{Broadcaster, ChannelBroadcaster, MemoryMailDispatcher};
    use warble_queue::JobQueue;
    use warble_store::{
        MemoryUserCache, PostDocument, PreferenceFlags, RocksStore, UserCache, UserDocument,
    };

    struct Fixture {
        service: CommentService<RocksStore>,
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
        let service = CommentService::new(store.clone(), fanout);

        Fixture {
            service,
            store,
            cache,
            mail,
            emails,
            _dir: dir,
        }
    }

    fn user(fix: &Fixture, username: &str, comments_enabled: bool) -> UserId {
        let user = UserDocument {
            user_id: UserId::generate(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            avatar_color: "coral".to_string(),
            notifications: PreferenceFlags {
                comments: comments_enabled,
                ..PreferenceFlags::default()
            },
            created_at: Utc::now(),
        };
        let id = user.user_id;
        fix.cache.insert(user);
        id
    }

    fn stored_post(fix: &Fixture, author_id: UserId) -> PostDocument {
        let post = PostDocument {
            post_id: PostId::generate(),
            author_id,
            username: "noor".to_string(),
            text: "thoughts on rust".to_string(),
            bg_color: "#ffffff".to_string(),
            privacy: "Public".to_string(),
            feelings: String::new(),
            gif_url: String::new(),
            img_id: "img-3".to_string(),
            img_version: "v1".to_string(),
            video_id: String::new(),
            created_at: Utc::now(),
        };
        fix.store.insert_post(&post).unwrap();
        post
    }

    fn comment(post_id: PostId, author_id: UserId, text: &str) -> CommentDocument {
        CommentDocument {
            comment_id: CommentId::generate(),
            post_id,
            author_id,
            username: "dana".to_string(),
            avatar_color: "coral".to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn comment_notifies_the_post_author() {
        let fix = setup();
        let commenter = user(&fix, "dana", true);
        let author = user(&fix, "noor", true);
        let post = stored_post(&fix, author);

        let applied = fix
            .service
            .add_comment(
                post.post_id,
                author,
                "dana",
                comment(post.post_id, commenter, "agreed"),
            )
            .await
            .unwrap();
        assert!(applied.inserted);
        assert!(applied.fanout.unwrap().receipt().unwrap().fully_delivered());

        assert_eq!(fix.store.post_comment_count(&post.post_id).unwrap(), 1);

        let inbox = fix.store.notifications_for(&author).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].comment_text, "agreed");
        assert_eq!(inbox[0].post_excerpt, "thoughts on rust");
        assert_eq!(inbox[0].img_id, "img-3");

        fix.emails.await_idle().await;
        assert_eq!(fix.mail.sent_count(), 1);
    }

    #[tokio::test]
    async fn replayed_comment_is_idempotent() {
        let fix = setup();
        let commenter = user(&fix, "dana", true);
        let author = user(&fix, "noor", true);
        let post = stored_post(&fix, author);
        let doc = comment(post.post_id, commenter, "agreed");

        fix.service
            .add_comment(post.post_id, author, "dana", doc.clone())
            .await
            .unwrap();
        let replay = fix
            .service
            .add_comment(post.post_id, author, "dana", doc)
            .await
            .unwrap();
        assert!(!replay.inserted);
        assert!(replay.fanout.is_none());

        assert_eq!(fix.store.post_comment_count(&post.post_id).unwrap(), 1);
        assert_eq!(fix.store.notifications_for(&author).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn own_post_comment_is_stored_but_silent() {
        let fix = setup();
        let author = user(&fix, "noor", true);
        let post = stored_post(&fix, author);

        let applied = fix
            .service
            .add_comment(
                post.post_id,
                author,
                "noor",
                comment(post.post_id, author, "replying to myself"),
            )
            .await
            .unwrap();
        assert!(applied.inserted);
        assert!(matches!(
            applied.fanout,
            Some(FanoutOutcome::Skipped(FanoutSkip::SelfAction))
        ));

        assert_eq!(fix.store.post_comment_count(&post.post_id).unwrap(), 1);
        assert!(fix.store.notifications_for(&author).unwrap().is_empty());
        fix.emails.await_idle().await;
        assert_eq!(fix.mail.sent_count(), 0);
    }

    #[tokio::test]
    async fn disabled_preference_keeps_comment_but_skips_delivery() {
        let fix = setup();
        let commenter = user(&fix, "dana", true);
        let author = user(&fix, "noor", false);
        let post = stored_post(&fix, author);

        let applied = fix
            .service
            .add_comment(
                post.post_id,
                author,
                "dana",
                comment(post.post_id, commenter, "still stored"),
            )
            .await
            .unwrap();
        assert!(matches!(
            applied.fanout,
            Some(FanoutOutcome::Skipped(FanoutSkip::PreferenceDisabled))
        ));

        assert_eq!(fix.store.post_comment_count(&post.post_id).unwrap(), 1);
        assert!(fix.store.notifications_for(&author).unwrap().is_empty());
        fix.emails.await_idle().await;
        assert_eq!(fix.mail.sent_count(), 0);
    }

    #[tokio::test]
    async fn deleted_post_keeps_comment_without_notification() {
        let fix = setup();
        let commenter = user(&fix, "dana", true);
        let author = user(&fix, "noor", true);
        let post = stored_post(&fix, author);
        fix.store.delete_post(&post.post_id).unwrap();

        let applied = fix
            .service
            .add_comment(
                post.post_id,
                author,
                "dana",
                comment(post.post_id, commenter, "into the void"),
            )
            .await
            .unwrap();
        assert!(applied.inserted);
        assert!(matches!(
            applied.fanout,
            Some(FanoutOutcome::Skipped(FanoutSkip::SourceMissing))
        ));
        assert!(fix.store.notifications_for(&author).unwrap().is_empty());
    }

    #[tokio::test]
    async fn comment_names_aggregate() {
        let fix = setup();
        let commenter = user(&fix, "dana", true);
        let author = user(&fix, "noor", true);
        let post = stored_post(&fix, author);

        for text in ["one", "two"] {
            fix.service
                .add_comment(
                    post.post_id,
                    author,
                    "dana",
                    comment(post.post_id, commenter, text),
                )
                .await
                .unwrap();
        }

        let names = fix.service.comment_names_for_post(&post.post_id).unwrap();
        assert_eq!(names.count, 2);
        assert_eq!(names.names, vec!["dana".to_string()]);

        let comments = fix.service.comments_for_post(&post.post_id).unwrap();
        assert_eq!(comments.len(), 2);
    }
}
