//! Real-time push contract and in-process hub.
//!
//! [`Broadcaster`] is the fire-and-forget push seam the fan-out writes to:
//! an event is addressed to one recipient and delivery is never
//! acknowledged, so an offline recipient simply misses it.
//! [`ChannelBroadcaster`] is the in-process implementation over a tokio
//! broadcast channel; delivery consumers and tests subscribe to observe the
//! stream.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use warble_core::UserId;

use crate::error::Result;

/// A push event addressed to one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEvent {
    /// Wire name clients match on.
    pub name: String,
    /// The user the event is addressed to.
    pub recipient: UserId,
    /// JSON payload delivered with the event.
    pub payload: serde_json::Value,
}

impl RealtimeEvent {
    /// Builds an event by serializing `payload` to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn new(
        name: impl Into<String>,
        recipient: UserId,
        payload: &impl Serialize,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            recipient,
            payload: serde_json::to_value(payload)?,
        })
    }
}

/// Fire-and-forget push delivery.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Emits one event.
    ///
    /// Success means the event was handed to the transport, not that the
    /// recipient saw it.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the event.
    async fn emit(&self, event: RealtimeEvent) -> Result<()>;
}

/// In-process broadcaster over a tokio broadcast channel.
///
/// Emitting with no live subscribers is not an error; the event is dropped
/// the same way a socket emit to an offline client is.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl ChannelBroadcaster {
    const DEFAULT_CAPACITY: usize = 256;

    /// Creates a broadcaster with the default per-subscriber buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a broadcaster buffering up to `capacity` unread events per
    /// subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn emit(&self, event: RealtimeEvent) -> Result<()> {
        let name = event.name.clone();
        let recipient = event.recipient;
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(
                    event = %name,
                    recipient = %recipient,
                    receivers,
                    "Broadcast event delivered"
                );
            }
            Err(_) => {
                tracing::debug!(
                    event = %name,
                    recipient = %recipient,
                    "Broadcast event dropped: no subscribers"
                );
            }
        }
        Ok(())
    }
}
