//! Delivery sinks for the warble pipeline.
//!
//! Fan-out ends in two fire-and-forget sinks: a real-time push over the
//! [`Broadcaster`] seam and an email handed to the [`MailDispatcher`] seam.
//! Both are contracts with in-process reference adapters so the pipeline
//! never couples to a concrete socket layer or mail provider:
//! [`ChannelBroadcaster`] fans events out over a tokio broadcast channel,
//! and [`HttpMailDispatcher`] posts rendered emails to an HTTP provider
//! API, with [`NoopMailDispatcher`] standing in when none is configured.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod broadcast;
pub mod error;
pub mod mail;
pub mod template;

pub use broadcast::{Broadcaster, ChannelBroadcaster, RealtimeEvent};
pub use error::{DeliveryError, Result};
pub use mail::{HttpMailDispatcher, MailConfig, MailDispatcher, NoopMailDispatcher, OutboundEmail};
pub use template::NotificationTemplate;

#[cfg(any(test, feature = "test-utils"))]
pub use mail::mock::MemoryMailDispatcher;
