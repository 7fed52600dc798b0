//! Background channel listener
//!
//! Runs on its own task, never on an arena tick. Each subscription is a
//! stream of raw payloads; when it ends the listener resubscribes with an
//! exponential backoff until cancelled.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use hashbrown::HashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::game::constants::store::{RESUBSCRIBE_DELAY_MS, RESUBSCRIBE_MAX_DELAY_MS};
use crate::metrics::Metrics;
use crate::net::protocol::{AddonEnvelope, ChannelMessage};
use crate::net::store::SharedStore;

/// Receives decoded channel messages
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, message: ChannelMessage);
}

/// Receives payloads addressed to one addon
#[async_trait::async_trait]
pub trait AddonHandler: Send + Sync {
    async fn on_addon_message(&self, envelope: AddonEnvelope);
}

/// Dispatches addon envelopes by name and logs plain notifications
#[derive(Default)]
pub struct MessageRouter {
    addons: HashMap<String, Arc<dyn AddonHandler>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; replaces any handler with the same name
    pub fn register_addon(&mut self, name: impl Into<String>, handler: Arc<dyn AddonHandler>) {
        self.addons.insert(name.into(), handler);
    }
}

#[async_trait::async_trait]
impl MessageHandler for MessageRouter {
    async fn on_message(&self, message: ChannelMessage) {
        match message {
            ChannelMessage::Plain(text) => debug!("Channel notification: {}", text),
            ChannelMessage::Addon(envelope) => match self.addons.get(&envelope.addon_name) {
                Some(handler) => handler.on_addon_message(envelope).await,
                None => debug!("No handler for addon '{}', dropping message", envelope.addon_name),
            },
        }
    }
}

/// Spawn the listener task
pub fn spawn_listener(
    store: Arc<dyn SharedStore>,
    channel: String,
    handler: Arc<dyn MessageHandler>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_listener(store, channel, handler, metrics, cancel))
}

async fn run_listener(
    store: Arc<dyn SharedStore>,
    channel: String,
    handler: Arc<dyn MessageHandler>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) {
    let initial_delay = Duration::from_millis(RESUBSCRIBE_DELAY_MS);
    let max_delay = Duration::from_millis(RESUBSCRIBE_MAX_DELAY_MS);
    let mut delay = initial_delay;

    loop {
        let subscribed = tokio::select! {
            () = cancel.cancelled() => break,
            result = store.subscribe(&channel) => result,
        };

        match subscribed {
            Ok(mut stream) => {
                info!("Subscribed to channel {}", channel);
                delay = initial_delay;
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => {
                            info!("Unsubscribed from channel {}", channel);
                            return;
                        }
                        next = stream.next() => match next {
                            Some(raw) => {
                                Metrics::incr(&metrics.messages_received);
                                handler.on_message(ChannelMessage::decode(&raw)).await;
                            }
                            None => {
                                warn!("Subscription to {} ended, resubscribing in {:?}", channel, delay);
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                Metrics::incr(&metrics.store_errors);
                warn!("Failed to subscribe to {}: {}, retrying in {:?}", channel, e, delay);
            }
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(max_delay);
    }

    info!("Unsubscribed from channel {}", channel);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::net::store::MemoryStore;
    use parking_lot::Mutex;
    use std::sync::atomic::Ordering;

    /// Handler that remembers everything it was given
    #[derive(Default)]
    pub(crate) struct Collect {
        pub(crate) messages: Mutex<Vec<ChannelMessage>>,
    }

    #[async_trait::async_trait]
    impl MessageHandler for Collect {
        async fn on_message(&self, message: ChannelMessage) {
            self.messages.lock().push(message);
        }
    }

    #[async_trait::async_trait]
    impl AddonHandler for Collect {
        async fn on_addon_message(&self, envelope: AddonEnvelope) {
            self.messages.lock().push(ChannelMessage::Addon(envelope));
        }
    }

    /// Let spawned tasks run until they block
    pub(crate) async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_listener_delivers_and_stops() {
        let store = Arc::new(MemoryStore::new());
        let handler = Arc::new(Collect::default());
        let metrics = Arc::new(Metrics::new());
        let cancel = CancellationToken::new();

        let join = spawn_listener(store.clone(), "bw2023".to_string(), handler.clone(), metrics.clone(), cancel.clone());
        settle().await;
        assert_eq!(store.subscriber_count("bw2023"), 1);

        store.publish("bw2023", "hello").await.unwrap();
        settle().await;

        cancel.cancel();
        join.await.unwrap();

        assert_eq!(*handler.messages.lock(), vec![ChannelMessage::Plain("hello".to_string())]);
        assert_eq!(metrics.messages_received.load(Ordering::Relaxed), 1);
        assert_eq!(store.subscriber_count("bw2023"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_resubscribes() {
        let store = Arc::new(MemoryStore::new());
        let handler = Arc::new(Collect::default());
        let cancel = CancellationToken::new();

        let join = spawn_listener(
            store.clone(),
            "bw2023".to_string(),
            handler.clone(),
            Arc::new(Metrics::new()),
            cancel.clone(),
        );
        settle().await;

        store.drop_subscribers("bw2023");
        settle().await;
        assert_eq!(store.subscriber_count("bw2023"), 0);

        tokio::time::sleep(Duration::from_millis(RESUBSCRIBE_DELAY_MS + 10)).await;
        settle().await;
        assert_eq!(store.subscriber_count("bw2023"), 1);

        store.publish("bw2023", "back").await.unwrap();
        settle().await;
        assert_eq!(handler.messages.lock().len(), 1);

        cancel.cancel();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn test_router_dispatches_addons() {
        let party = Arc::new(Collect::default());
        let mut router = MessageRouter::new();
        router.register_addon("party", party.clone());

        router
            .on_message(ChannelMessage::addon("party", &serde_json::json!({"id": 1})))
            .await;
        router
            .on_message(ChannelMessage::addon("unknown", &serde_json::json!({})))
            .await;
        router.on_message(ChannelMessage::Plain("note".to_string())).await;

        assert_eq!(party.messages.lock().len(), 1);
    }
}
