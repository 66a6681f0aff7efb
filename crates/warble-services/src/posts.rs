//! Post persistence service.
//!
//! Posts produce no notifications; the service is a thin idempotent
//! layer over the store that keeps the author's post counter in step
//! with the documents.

use std::sync::Arc;

use warble_core::PostId;
use warble_store::{PostDocument, PostFilter, PostUpdate, Store};

use crate::error::Result;

/// Durable writes and reads for posts.
pub struct PostService<S> {
    store: Arc<S>,
}

impl<S: Store> PostService<S> {
    /// Creates the service over the given store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Inserts a post and bumps the author's post counter in one batch.
    /// Returns `false` without writing when the id already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the batch write fails.
    pub fn add_post(&self, post: &PostDocument) -> Result<bool> {
        let inserted = self.store.insert_post(post)?;
        if inserted {
            tracing::info!(post_id = %post.post_id, author = %post.author_id, "Inserted post");
        } else {
            tracing::debug!(post_id = %post.post_id, "Post already present; skipping");
        }
        Ok(inserted)
    }

    /// Replaces the mutable content fields of a post. Identity fields and
    /// `created_at` keep their stored values. Returns `false` when the
    /// post does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or the write fails.
    pub fn update_post(&self, post_id: &PostId, update: &PostUpdate) -> Result<bool> {
        let updated = self.store.update_post(post_id, update)?;
        if updated {
            tracing::info!(post_id = %post_id, "Updated post");
        } else {
            tracing::debug!(post_id = %post_id, "No post to update");
        }
        Ok(updated)
    }

    /// Deletes a post and drops the author's post counter in one batch.
    /// Returns `false` without writing when the post does not exist.
    ///
    /// Comments under the post are left in place; they are unreachable
    /// through the feed once the post is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or the batch write fails.
    pub fn delete_post(&self, post_id: &PostId) -> Result<bool> {
        let deleted = self.store.delete_post(post_id)?;
        if deleted {
            tracing::info!(post_id = %post_id, "Deleted post");
        } else {
            tracing::debug!(post_id = %post_id, "No post to delete");
        }
        Ok(deleted)
    }

    /// Fetches one post by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn get_post(&self, post_id: &PostId) -> Result<Option<PostDocument>> {
        Ok(self.store.get_post(post_id)?)
    }

    /// A page of posts, newest first, after `skip` and at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn posts_page(
        &self,
        filter: PostFilter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PostDocument>> {
        Ok(self.store.posts_page(filter, skip, limit)?)
    }

    /// Total number of stored posts.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn posts_count(&self) -> Result<usize> {
        Ok(self.store.posts_count()?)
    }
}
