//! Error types for the delivery sinks.

use thiserror::Error;

/// Result alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Errors raised by the broadcast and mail adapters.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The mail provider request never produced a response.
    #[error("mail request failed: {0}")]
    MailRequest(String),

    /// The mail provider answered with a non-success status.
    #[error("mail provider returned status {status}: {message}")]
    MailRejected {
        /// HTTP status code from the provider.
        status: u16,
        /// Provider error body, or a fallback naming the status.
        message: String,
    },

    /// An event payload could not be serialized for the wire.
    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display_includes_status() {
        let err = DeliveryError::MailRejected {
            status: 503,
            message: "upstream busy".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "mail provider returned status 503: upstream busy"
        );
    }
}
