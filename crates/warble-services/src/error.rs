//! Error types for the persistence services.

use thiserror::Error;
use warble_queue::HandlerError;

/// Result alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors raised by the persistence services and fan-out.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] warble_store::StoreError),

    /// Queue runtime error.
    #[error("queue error: {0}")]
    Queue(#[from] warble_queue::QueueError),

    /// Delivery sink error.
    #[error("delivery error: {0}")]
    Delivery(#[from] warble_delivery::DeliveryError),
}

impl ServiceError {
    /// Returns true if re-running the job might succeed.
    ///
    /// Every variant wraps an infrastructure failure, and every handler is
    /// idempotent, so an external retry wrapper may treat all of them as
    /// retriable. The classification exists so that changes stay local if a
    /// non-retriable variant ever appears.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Queue(_) | Self::Delivery(_))
    }
}

impl From<ServiceError> for HandlerError {
    fn from(err: ServiceError) -> Self {
        Self::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warble_store::StoreError;

    #[test]
    fn store_errors_are_retriable() {
        let err = ServiceError::from(StoreError::Database("io failure".to_string()));
        assert!(err.is_retriable());
    }

    #[test]
    fn converts_into_handler_error() {
        let err = ServiceError::from(StoreError::Database("io failure".to_string()));
        let handler_err = HandlerError::from(err);
        assert!(handler_err.to_string().contains("storage error"));
    }
}
