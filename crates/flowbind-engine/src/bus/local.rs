//! In-process [`MessageBus`] over bounded tokio channels.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use super::{
    validate_channel_name, BindingHandle, BindingRole, ConsumerBinding, Frame, MessageBus,
    ProducerBinding, Publisher, Subscription,
};
use crate::error::BusError;

/// Frames buffered per channel before producers wait.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

struct LocalChannel {
    sender: mpsc::Sender<Frame>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Frame>>>,
    bindings: HashSet<u64>,
}

impl LocalChannel {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(AsyncMutex::new(receiver)),
            bindings: HashSet::new(),
        }
    }
}

/// Message bus whose channels live in this process.
///
/// A channel's queue is created by whichever side binds first and lives as
/// long as any binding remains on it, so frames published before a consumer
/// arrives (or while one side is being redeployed) stay buffered.
///
/// Releasing the last binding drops the channel. Subscriptions still held
/// drain what was buffered and then see `None` once every [`Publisher`] is
/// gone; the next bind on that name starts a fresh queue.
pub struct LocalMessageBus {
    capacity: usize,
    next_id: AtomicU64,
    channels: Mutex<HashMap<String, LocalChannel>>,
}

impl LocalMessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be positive");
        Self {
            capacity,
            next_id: AtomicU64::new(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Names of every open channel, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::LockPoisoned`] if the channel table is poisoned.
    pub fn channel_names(&self) -> Result<Vec<String>, BusError> {
        let channels = self.channels.lock().map_err(|_| BusError::LockPoisoned)?;
        let mut names: Vec<String> = channels.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Live bindings (both sides) on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::LockPoisoned`] if the channel table is poisoned.
    pub fn binding_count(&self, channel: &str) -> Result<usize, BusError> {
        let channels = self.channels.lock().map_err(|_| BusError::LockPoisoned)?;
        Ok(channels.get(channel).map_or(0, |c| c.bindings.len()))
    }

    fn attach(
        &self,
        channel: &str,
        role: BindingRole,
    ) -> Result<(BindingHandle, mpsc::Sender<Frame>, Arc<AsyncMutex<mpsc::Receiver<Frame>>>), BusError> {
        validate_channel_name(channel)?;
        let mut channels = self.channels.lock().map_err(|_| BusError::LockPoisoned)?;
        let entry = channels
            .entry(channel.to_string())
            .or_insert_with(|| LocalChannel::new(self.capacity));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        entry.bindings.insert(id);
        tracing::debug!(channel, %role, id, "Attached to local channel");

        Ok((
            BindingHandle::new(id, channel, role),
            entry.sender.clone(),
            Arc::clone(&entry.receiver),
        ))
    }
}

impl Default for LocalMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for LocalMessageBus {
    async fn bind_consumer(&self, channel: &str) -> Result<ConsumerBinding, BusError> {
        let (handle, _, receiver) = self.attach(channel, BindingRole::Consumer)?;
        Ok(ConsumerBinding {
            handle,
            subscription: Subscription::new(channel, receiver),
        })
    }

    async fn bind_producer(&self, channel: &str) -> Result<ProducerBinding, BusError> {
        let (handle, sender, _) = self.attach(channel, BindingRole::Producer)?;
        Ok(ProducerBinding {
            handle,
            publisher: Publisher::new(channel, sender),
        })
    }

    async fn unbind(&self, handle: &BindingHandle) -> Result<(), BusError> {
        let mut channels = self.channels.lock().map_err(|_| BusError::LockPoisoned)?;
        let Some(entry) = channels.get_mut(handle.channel()) else {
            return Err(BusError::UnknownBinding(handle.clone()));
        };
        if !entry.bindings.remove(&handle.id()) {
            return Err(BusError::UnknownBinding(handle.clone()));
        }
        tracing::debug!(channel = handle.channel(), role = %handle.role(), id = handle.id(), "Detached from local channel");

        if entry.bindings.is_empty() {
            channels.remove(handle.channel());
            tracing::debug!(channel = handle.channel(), "Closed local channel");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn producer_first_frames_are_buffered() {
        let bus = LocalMessageBus::new();
        let producer = bus.bind_producer("orders.0").await.unwrap();
        producer.publisher.send(Frame::Data(Bytes::from_static(b"a"))).await.unwrap();
        producer.publisher.send(Frame::EndStream).await.unwrap();

        let consumer = bus.bind_consumer("orders.0").await.unwrap();
        assert_eq!(
            consumer.subscription.recv().await,
            Some(Frame::Data(Bytes::from_static(b"a")))
        );
        assert_eq!(consumer.subscription.recv().await, Some(Frame::EndStream));
    }

    #[tokio::test]
    async fn consumer_first_receives_later_frames() {
        let bus = LocalMessageBus::new();
        let consumer = bus.bind_consumer("orders.1").await.unwrap();
        let producer = bus.bind_producer("orders.1").await.unwrap();
        producer.publisher.send(Frame::EndStream).await.unwrap();
        assert_eq!(consumer.subscription.recv().await, Some(Frame::EndStream));
    }

    #[tokio::test]
    async fn distinct_names_do_not_rendezvous() {
        let bus = LocalMessageBus::new();
        let producer = bus.bind_producer("orders.0").await.unwrap();
        let _other = bus.bind_consumer("orders.1").await.unwrap();
        producer.publisher.send(Frame::EndStream).await.unwrap();
        assert_eq!(bus.channel_names().unwrap(), ["orders.0", "orders.1"]);
        assert_eq!(bus.binding_count("orders.0").unwrap(), 1);
    }

    #[tokio::test]
    async fn rebound_consumer_sees_buffered_frames() {
        let bus = LocalMessageBus::new();
        let first = bus.bind_consumer("orders.0").await.unwrap();
        bus.unbind(&first.handle).await.unwrap();

        let producer = bus.bind_producer("orders.0").await.unwrap();
        producer.publisher.send(Frame::EndStream).await.unwrap();

        let second = bus.bind_consumer("orders.0").await.unwrap();
        assert_eq!(second.subscription.recv().await, Some(Frame::EndStream));
        assert_eq!(bus.binding_count("orders.0").unwrap(), 2);
    }

    #[tokio::test]
    async fn releasing_last_binding_ends_subscriptions() {
        let bus = LocalMessageBus::new();
        let consumer = bus.bind_consumer("orders.0").await.unwrap();
        let producer = bus.bind_producer("orders.0").await.unwrap();
        producer.publisher.send(Frame::EndStream).await.unwrap();

        bus.unbind(&producer.handle).await.unwrap();
        drop(producer.publisher);
        bus.unbind(&consumer.handle).await.unwrap();
        assert!(bus.channel_names().unwrap().is_empty());

        let subscription = consumer.subscription;
        let drained = timeout(Duration::from_secs(1), subscription.recv()).await.unwrap();
        assert_eq!(drained, Some(Frame::EndStream));
        let ended = timeout(Duration::from_secs(1), subscription.recv()).await.unwrap();
        assert_eq!(ended, None);
    }

    #[tokio::test]
    async fn bound_consumer_survives_producer_redeploy() {
        let bus = LocalMessageBus::new();
        let consumer = bus.bind_consumer("orders.0").await.unwrap();

        let first = bus.bind_producer("orders.0").await.unwrap();
        bus.unbind(&first.handle).await.unwrap();
        drop(first.publisher);
        assert!(
            timeout(Duration::from_millis(50), consumer.subscription.recv())
                .await
                .is_err(),
            "subscription must stay open while the consumer is bound"
        );

        let second = bus.bind_producer("orders.0").await.unwrap();
        second.publisher.send(Frame::EndStream).await.unwrap();
        assert_eq!(consumer.subscription.recv().await, Some(Frame::EndStream));
        assert_eq!(bus.channel_names().unwrap(), ["orders.0"]);
    }

    #[tokio::test]
    async fn unbind_twice_is_unknown() {
        let bus = LocalMessageBus::new();
        let binding = bus.bind_producer("orders.0").await.unwrap();
        bus.unbind(&binding.handle).await.unwrap();
        let err = bus.unbind(&binding.handle).await.unwrap_err();
        assert!(matches!(err, BusError::UnknownBinding(_)));
        assert_eq!(bus.binding_count("orders.0").unwrap(), 0);
        assert!(bus.channel_names().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_channel_is_rejected() {
        let bus = LocalMessageBus::new();
        let err = bus.bind_consumer("").await.unwrap_err();
        assert!(matches!(err, BusError::InvalidChannelName(_)));
        assert!(bus.channel_names().unwrap().is_empty());
    }
}
