//! Queue topology and worker wiring.
//!
//! Five queues partition the workload: one per entity family plus a
//! dedicated email queue. Entity jobs fan out into email jobs, so the
//! email queue is downstream of all the others; [`Pipeline::await_idle`]
//! drains them in that order.

use std::sync::Arc;

use warble_core::JobId;
use warble_delivery::{Broadcaster, MailDispatcher};
use warble_queue::{JobQueue, MetricsSnapshot, QueueConfig};
use warble_store::{Store, UserCache};

use crate::comments::CommentService;
use crate::error::Result;
use crate::fanout::NotificationFanout;
use crate::followers::FollowerService;
use crate::notifications::NotificationService;
use crate::payload::{job_names, JobPayload};
use crate::posts::PostService;
use crate::workers::{CommentWorker, EmailWorker, FollowerWorker, NotificationWorker, PostWorker};

/// Queue names, one per worker family.
pub mod queue_names {
    /// Follow and unfollow jobs.
    pub const FOLLOWERS: &str = "followers";
    /// Post create, update and delete jobs.
    pub const POSTS: &str = "posts";
    /// Comment jobs.
    pub const COMMENTS: &str = "comments";
    /// Notification read-flag and deletion jobs.
    pub const NOTIFICATIONS: &str = "notifications";
    /// Outbound email jobs produced by the fan-out.
    pub const EMAILS: &str = "emails";
}

/// Tuning knobs for the whole pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Concurrent handler invocations per job binding.
    pub worker_concurrency: usize,
    /// Per-queue runtime settings, shared by all five queues.
    pub queue: QueueConfig,
}

impl PipelineConfig {
    const DEFAULT_WORKER_CONCURRENCY: usize = 5;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: Self::DEFAULT_WORKER_CONCURRENCY,
            queue: QueueConfig::default(),
        }
    }
}

/// The assembled write-behind pipeline: five queues, four services, and
/// the fan-out they share.
pub struct Pipeline<S> {
    followers: JobQueue<JobPayload>,
    posts: JobQueue<JobPayload>,
    comments: JobQueue<JobPayload>,
    notifications: JobQueue<JobPayload>,
    emails: JobQueue<JobPayload>,
    follower_service: Arc<FollowerService<S>>,
    post_service: Arc<PostService<S>>,
    comment_service: Arc<CommentService<S>>,
    notification_service: Arc<NotificationService<S>>,
}

impl<S: Store + 'static> Pipeline<S> {
    /// Builds the queues and services and registers every job binding.
    ///
    /// # Errors
    ///
    /// Returns an error if a job name registers twice, which indicates a
    /// construction bug rather than a runtime condition.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(
        store: Arc<S>,
        cache: Arc<dyn UserCache>,
        broadcaster: Arc<dyn Broadcaster>,
        mail: Arc<dyn MailDispatcher>,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let followers = JobQueue::with_config(queue_names::FOLLOWERS, config.queue.clone());
        let posts = JobQueue::with_config(queue_names::POSTS, config.queue.clone());
        let comments = JobQueue::with_config(queue_names::COMMENTS, config.queue.clone());
        let notifications = JobQueue::with_config(queue_names::NOTIFICATIONS, config.queue.clone());
        let emails = JobQueue::with_config(queue_names::EMAILS, config.queue.clone());

        let fanout = Arc::new(NotificationFanout::new(
            Arc::clone(&store),
            cache,
            broadcaster,
            emails.clone(),
        ));

        let follower_service = Arc::new(FollowerService::new(
            Arc::clone(&store),
            Arc::clone(&fanout),
        ));
        let comment_service = Arc::new(CommentService::new(Arc::clone(&store), fanout));
        let post_service = Arc::new(PostService::new(Arc::clone(&store)));
        let notification_service = Arc::new(NotificationService::new(store));

        let concurrency = config.worker_concurrency;

        let follower_worker = Arc::new(FollowerWorker::new(Arc::clone(&follower_service)));
        followers.register(
            job_names::ADD_FOLLOWER,
            concurrency,
            Arc::clone(&follower_worker),
        )?;
        followers.register(job_names::REMOVE_FOLLOWER, concurrency, follower_worker)?;

        let post_worker = Arc::new(PostWorker::new(Arc::clone(&post_service)));
        posts.register(
            job_names::ADD_POST,
            concurrency,
            Arc::clone(&post_worker),
        )?;
        posts.register(
            job_names::UPDATE_POST,
            concurrency,
            Arc::clone(&post_worker),
        )?;
        posts.register(job_names::DELETE_POST, concurrency, post_worker)?;

        let comment_worker = Arc::new(CommentWorker::new(Arc::clone(&comment_service)));
        comments.register(job_names::ADD_COMMENT, concurrency, comment_worker)?;

        let notification_worker =
            Arc::new(NotificationWorker::new(Arc::clone(&notification_service)));
        notifications.register(
            job_names::MARK_NOTIFICATION_READ,
            concurrency,
            Arc::clone(&notification_worker),
        )?;
        notifications.register(
            job_names::DELETE_NOTIFICATION,
            concurrency,
            notification_worker,
        )?;

        emails.register(
            job_names::SEND_EMAIL,
            concurrency,
            Arc::new(EmailWorker::new(mail)),
        )?;

        tracing::info!(
            worker_concurrency = concurrency,
            "Pipeline queues registered"
        );

        Ok(Self {
            followers,
            posts,
            comments,
            notifications,
            emails,
            follower_service,
            post_service,
            comment_service,
            notification_service,
        })
    }

    /// Routes a payload to the queue owning its job name.
    ///
    /// # Errors
    ///
    /// Returns an error when the target queue has shut down.
    pub fn enqueue(&self, payload: JobPayload) -> Result<JobId> {
        Ok(self.queue_for(&payload).enqueue(payload)?)
    }

    fn queue_for(&self, payload: &JobPayload) -> &JobQueue<JobPayload> {
        match payload {
            JobPayload::AddFollower { .. } | JobPayload::RemoveFollower { .. } => &self.followers,
            JobPayload::AddPost { .. }
            | JobPayload::UpdatePost { .. }
            | JobPayload::DeletePost { .. } => &self.posts,
            JobPayload::AddComment { .. } => &self.comments,
            JobPayload::MarkNotificationRead { .. } | JobPayload::DeleteNotification { .. } => {
                &self.notifications
            }
            JobPayload::SendEmail { .. } => &self.emails,
        }
    }

    /// Waits until every queue is idle, entity queues before the email
    /// queue they feed.
    pub async fn await_idle(&self) {
        self.followers.await_idle().await;
        self.posts.await_idle().await;
        self.comments.await_idle().await;
        self.notifications.await_idle().await;
        self.emails.await_idle().await;
    }

    /// Closes every queue to new work. In-flight jobs finish.
    pub fn shutdown(&self) {
        for queue in self.queues() {
            queue.shutdown();
        }
    }

    /// Metrics snapshot per queue, in pipeline order.
    #[must_use]
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.queues()
            .into_iter()
            .map(|queue| (queue.name().to_string(), queue.metrics()))
            .collect()
    }

    fn queues(&self) -> [&JobQueue<JobPayload>; 5] {
        [
            &self.followers,
            &self.posts,
            &self.comments,
            &self.notifications,
            &self.emails,
        ]
    }

    /// The follower queue.
    #[must_use]
    pub fn followers(&self) -> &JobQueue<JobPayload> {
        &self.followers
    }

    /// The post queue.
    #[must_use]
    pub fn posts(&self) -> &JobQueue<JobPayload> {
        &self.posts
    }

    /// The comment queue.
    #[must_use]
    pub fn comments(&self) -> &JobQueue<JobPayload> {
        &self.comments
    }

    /// The notification queue.
    #[must_use]
    pub fn notifications(&self) -> &JobQueue<JobPayload> {
        &self.notifications
    }

    /// The email queue.
    #[must_use]
    pub fn emails(&self) -> &JobQueue<JobPayload> {
        &self.emails
    }

    /// The follower service, for direct reads.
    #[must_use]
    pub fn follower_service(&self) -> &FollowerService<S> {
        &self.follower_service
    }

    /// The post service, for direct reads.
    #[must_use]
    pub fn post_service(&self) -> &PostService<S> {
        &self.post_service
    }

    /// The comment service, for direct reads.
    #[must_use]
    pub fn comment_service(&self) -> &CommentService<S> {
        &self.comment_service
    }

    /// The notification service, for direct reads.
    #[must_use]
    pub fn notification_service(&self) -> &NotificationService<S> {
        &self.notification_service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use warble_delivery::{ChannelBroadcaster, MemoryMailDispatcher, NoopMailDispatcher};
    use warble_store::{MemoryUserCache, RocksStore};

    fn build(mail: Arc<dyn MailDispatcher>) -> (Pipeline<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let cache: Arc<dyn UserCache> = Arc::new(MemoryUserCache::new());
        let hub: Arc<dyn Broadcaster> = Arc::new(ChannelBroadcaster::new());
        let pipeline =
            Pipeline::new(store, cache, hub, mail, &PipelineConfig::default()).unwrap();
        (pipeline, dir)
    }

    #[test]
    fn default_config_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.worker_concurrency, 5);
        assert_eq!(config.queue.handler_timeout_seconds, 30);
    }

    #[tokio::test]
    async fn enqueue_routes_by_job_name() {
        let (pipeline, _dir) = build(Arc::new(NoopMailDispatcher::new()));

        pipeline
            .enqueue(JobPayload::RemoveFollower {
                follower_id: warble_core::UserId::generate(),
                followee_id: warble_core::UserId::generate(),
            })
            .unwrap();
        pipeline
            .enqueue(JobPayload::DeleteNotification {
                notification_id: warble_core::NotificationId::generate(),
            })
            .unwrap();

        pipeline.await_idle().await;
        assert_eq!(pipeline.followers().metrics().enqueued, 1);
        assert_eq!(pipeline.notifications().metrics().enqueued, 1);
        assert_eq!(pipeline.posts().metrics().enqueued, 0);
    }

    #[tokio::test]
    async fn shutdown_closes_every_queue() {
        let (pipeline, _dir) = build(Arc::new(MemoryMailDispatcher::new()));
        pipeline.shutdown();

        let err = pipeline
            .enqueue(JobPayload::RemoveFollower {
                follower_id: warble_core::UserId::generate(),
                followee_id: warble_core::UserId::generate(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("shut down"));
    }

    #[tokio::test]
    async fn metrics_cover_all_queues() {
        let (pipeline, _dir) = build(Arc::new(MemoryMailDispatcher::new()));
        let metrics = pipeline.metrics();
        let names: Vec<&str> = metrics.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                queue_names::FOLLOWERS,
                queue_names::POSTS,
                queue_names::COMMENTS,
                queue_names::NOTIFICATIONS,
                queue_names::EMAILS,
            ]
        );
    }
}
