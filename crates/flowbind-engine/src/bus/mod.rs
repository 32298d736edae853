//! Message bus capability consumed by binder plugins.
//!
//! The engine never talks to a transport directly. A [`MessageBus`] only has
//! to guarantee that two bindings made with the same channel name rendezvous.
//! Frames cross the binding boundary through tokio channels: a consumer gets
//! a [`Subscription`] to drain and a producer gets a [`Publisher`] to feed;
//! transports bridge those to the wire.

mod local;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::error::BusError;

pub use local::{LocalMessageBus, DEFAULT_CHANNEL_CAPACITY};

/// Unit of data carried on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Opaque payload.
    Data(Bytes),
    /// End-of-stream marker.
    EndStream,
}

/// Which side of a channel a binding is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingRole {
    Consumer,
    Producer,
}

impl fmt::Display for BindingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Consumer => f.write_str("consumer"),
            Self::Producer => f.write_str("producer"),
        }
    }
}

/// Token identifying one binding, used to release it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingHandle {
    id: u64,
    channel: String,
    role: BindingRole,
}

impl BindingHandle {
    pub fn new(id: u64, channel: impl Into<String>, role: BindingRole) -> Self {
        Self {
            id,
            channel: channel.into(),
            role,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn role(&self) -> BindingRole {
        self.role
    }
}

impl fmt::Display for BindingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{} on '{}'", self.role, self.id, self.channel)
    }
}

/// Receiving end of a consumer binding.
///
/// Consumers bound to the same channel share one queue and compete for frames.
#[derive(Debug, Clone)]
pub struct Subscription {
    channel: String,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Frame>>>,
}

impl Subscription {
    pub fn new(channel: impl Into<String>, receiver: Arc<AsyncMutex<mpsc::Receiver<Frame>>>) -> Self {
        Self {
            channel: channel.into(),
            receiver,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next frame.
    ///
    /// `None` once the queue is drained and closed. When that happens is up to
    /// the bus; [`LocalMessageBus`] closes a channel when its last binding is
    /// released and every [`Publisher`] has been dropped.
    pub async fn recv(&self) -> Option<Frame> {
        self.receiver.lock().await.recv().await
    }
}

/// Sending end of a producer binding.
#[derive(Debug, Clone)]
pub struct Publisher {
    channel: String,
    sender: mpsc::Sender<Frame>,
}

impl Publisher {
    pub fn new(channel: impl Into<String>, sender: mpsc::Sender<Frame>) -> Self {
        Self {
            channel: channel.into(),
            sender,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish a frame, waiting for queue space if the channel is full.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ChannelClosed`] if the receiving side is gone.
    pub async fn send(&self, frame: Frame) -> Result<(), BusError> {
        self.sender
            .send(frame)
            .await
            .map_err(|_| BusError::ChannelClosed(self.channel.clone()))
    }
}

/// Result of [`MessageBus::bind_consumer`].
#[derive(Debug)]
pub struct ConsumerBinding {
    pub handle: BindingHandle,
    pub subscription: Subscription,
}

/// Result of [`MessageBus::bind_producer`].
#[derive(Debug)]
pub struct ProducerBinding {
    pub handle: BindingHandle,
    pub publisher: Publisher,
}

/// Publish/subscribe capability keyed by channel name.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn MessageBus>`.
/// Bind order between the two sides of a channel is irrelevant. Blocking,
/// retrying and timeouts are the implementation's business.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Attach a consumer to `channel`.
    async fn bind_consumer(&self, channel: &str) -> Result<ConsumerBinding, BusError>;

    /// Attach a producer to `channel`.
    async fn bind_producer(&self, channel: &str) -> Result<ProducerBinding, BusError>;

    /// Release a binding obtained from this bus.
    async fn unbind(&self, handle: &BindingHandle) -> Result<(), BusError>;
}

/// Reject channel names without visible text.
///
/// # Errors
///
/// Returns [`BusError::InvalidChannelName`].
pub fn validate_channel_name(channel: &str) -> Result<(), BusError> {
    if channel.trim().is_empty() {
        return Err(BusError::InvalidChannelName(channel.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn MessageBus) {}
    }

    #[test]
    fn blank_channel_names_are_rejected() {
        assert!(validate_channel_name("orders.0").is_ok());
        assert!(matches!(
            validate_channel_name("  "),
            Err(BusError::InvalidChannelName(_))
        ));
    }

    #[tokio::test]
    async fn publisher_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let publisher = Publisher::new("orders.0", tx);
        let err = publisher.send(Frame::EndStream).await.unwrap_err();
        assert!(matches!(err, BusError::ChannelClosed(ref c) if c == "orders.0"));
    }
}
