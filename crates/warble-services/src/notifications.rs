//! Notification inbox service.
//!
//! Creation happens in the fan-out; this service covers the recipient's
//! side of the record lifecycle.

use std::sync::Arc;

use warble_core::{NotificationId, UserId};
use warble_store::{NotificationDocument, Store};

use crate::error::Result;

/// Read-flag and deletion writes for persisted notifications.
pub struct NotificationService<S> {
    store: Arc<S>,
}

impl<S: Store> NotificationService<S> {
    /// Creates the service over the given store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Marks a notification read. Returns `false` when it does not exist;
    /// marking an already-read record again is a harmless overwrite.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    pub fn mark_read(&self, notification_id: &NotificationId) -> Result<bool> {
        let marked = self.store.mark_notification_read(notification_id)?;
        if marked {
            tracing::info!(notification_id = %notification_id, "Marked notification read");
        } else {
            tracing::debug!(notification_id = %notification_id, "No notification to mark read");
        }
        Ok(marked)
    }

    /// Deletes a notification. Returns `false` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the check or the write fails.
    pub fn delete(&self, notification_id: &NotificationId) -> Result<bool> {
        let deleted = self.store.delete_notification(notification_id)?;
        if deleted {
            tracing::info!(notification_id = %notification_id, "Deleted notification");
        } else {
            tracing::debug!(notification_id = %notification_id, "No notification to delete");
        }
        Ok(deleted)
    }

    /// A recipient's inbox, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn inbox(&self, user_id: &UserId) -> Result<Vec<NotificationDocument>> {
        Ok(self.store.notifications_for(user_id)?)
    }
}
