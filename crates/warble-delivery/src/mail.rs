//! Email dispatch contract and adapters.
//!
//! [`MailDispatcher`] is the seam the email worker calls; the pipeline
//! itself only ever enqueues [`OutboundEmail`] jobs. [`HttpMailDispatcher`]
//! posts to an HTTP mail-provider API; [`NoopMailDispatcher`] serves
//! deployments with no provider configured.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DeliveryError, Result};

/// One email as produced by notification fan-out.
///
/// `template` is the fully rendered HTML body; nothing downstream
/// interpolates into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    /// Destination address.
    pub receiver_email: String,
    /// Subject line.
    pub subject: String,
    /// Rendered HTML body.
    pub template: String,
}

/// Email delivery seam.
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    /// Hands one email to the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable or rejects the
    /// message.
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

/// Configuration for the HTTP mail provider.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Full URL of the provider's send endpoint.
    pub api_url: String,

    /// Bearer token for the provider API.
    pub api_key: String,

    /// Sender address the provider sends as.
    #[serde(default = "MailConfig::default_sender")]
    pub sender: String,

    /// Provider request timeout in seconds.
    #[serde(default = "MailConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl MailConfig {
    fn default_sender() -> String {
        "no-reply@warble.social".to_string()
    }

    const fn default_request_timeout() -> u64 {
        10
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            sender: Self::default_sender(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

/// HTTP client for a transactional mail-provider API.
#[derive(Debug, Clone)]
pub struct HttpMailDispatcher {
    client: reqwest::Client,
    config: MailConfig,
}

impl HttpMailDispatcher {
    /// Create a new dispatcher for the configured provider.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(config: MailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Create a dispatcher with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: MailConfig) -> Self {
        Self { client, config }
    }

    /// The configured send endpoint.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }
}

/// Request body for the provider's send endpoint.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: String,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Error response from the provider.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[async_trait]
impl MailDispatcher for HttpMailDispatcher {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let request = SendRequest {
            from: format!("Warble <{}>", self.config.sender),
            to: &email.receiver_email,
            subject: &email.subject,
            html: &email.template,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::MailRequest(format!("Mail request failed: {e}")))?;

        if response.status().is_success() {
            tracing::info!(subject = %email.subject, "Mail provider accepted email");
            Ok(())
        } else {
            let status = response.status();
            let message = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("Mail provider returned status {status}"));

            tracing::error!(
                status = %status,
                error = %message,
                "Mail provider rejected email"
            );

            Err(DeliveryError::MailRejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// A no-op dispatcher for when no mail provider is configured.
///
/// Logs each send without delivering anything.
#[derive(Debug, Clone, Default)]
pub struct NoopMailDispatcher;

impl NoopMailDispatcher {
    /// Create a new no-op dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailDispatcher for NoopMailDispatcher {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        tracing::warn!(
            subject = %email.subject,
            "NoopMailDispatcher: send called but no mail provider configured"
        );
        Ok(())
    }
}

/// In-memory dispatcher for tests that assert on sent mail.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A dispatcher that records emails instead of delivering them.
    #[derive(Default)]
    pub struct MemoryMailDispatcher {
        sent: Mutex<Vec<OutboundEmail>>,
        failing: AtomicBool,
    }

    impl MemoryMailDispatcher {
        /// Create an empty dispatcher.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent send fail.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Every email sent so far, oldest first.
        #[must_use]
        pub fn sent(&self) -> Vec<OutboundEmail> {
            self.sent.lock().clone()
        }

        /// Number of emails sent so far.
        #[must_use]
        pub fn sent_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl MailDispatcher for MemoryMailDispatcher {
        async fn send(&self, email: &OutboundEmail) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DeliveryError::MailRequest(
                    "MemoryMailDispatcher set to fail".to_string(),
                ));
            }
            self.sent.lock().push(email.clone());
            Ok(())
        }
    }
}
