//! Shared key/value store and pub/sub channel abstraction
//!
//! [`SharedStore`] is the seam between the coordination layer and the
//! backing service. The Redis implementation lives in `redis_store`;
//! [`MemoryStore`] backs standalone servers and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Inbound channel payloads, in delivery order for one subscription
pub type MessageStream = BoxStream<'static, String>;

/// Flat field -> value hash
pub type FieldMap = BTreeMap<String, String>;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store closed")]
    Closed,
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Shared hash store plus pub/sub channel.
///
/// Implementations must serve `subscribe` from a connection that is never
/// used for ordinary commands.
#[async_trait::async_trait]
pub trait SharedStore: Send + Sync {
    /// Write every field of a hash, overwriting in place
    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Write a field only if it is absent. Returns true if written.
    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    async fn hget_all(&self, key: &str) -> Result<FieldMap, StoreError>;

    /// Keys matching a glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> Result<usize, StoreError>;

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError>;

    /// Open a dedicated subscription. The stream ends when the connection drops.
    async fn subscribe(&self, channel: &str) -> Result<MessageStream, StoreError>;

    /// Release connections. Every later call fails with [`StoreError::Closed`].
    async fn close(&self);
}

const CHANNEL_CAPACITY: usize = 256;

/// In-process store with Redis-like semantics
#[derive(Debug)]
pub struct MemoryStore {
    hashes: Mutex<BTreeMap<String, FieldMap>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    available: AtomicBool,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            hashes: Mutex::new(BTreeMap::new()),
            channels: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulate losing (or regaining) the connection
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop every subscription on a channel, ending their streams
    pub fn drop_subscribers(&self, channel: &str) {
        self.channels.lock().remove(channel);
    }

    /// Copy of the whole keyspace
    pub fn snapshot(&self) -> BTreeMap<String, FieldMap> {
        self.hashes.lock().clone()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Glob match supporting `*` wildcards
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return key.is_empty();
    };
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No wildcard: exact match
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[async_trait::async_trait]
impl SharedStore for MemoryStore {
    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut hashes = self.hashes.lock();
        let hash = hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.hashes
            .lock()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut hashes = self.hashes.lock();
        let hash = hashes.entry(key.to_string()).or_default();
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .hashes
            .lock()
            .get(key)
            .and_then(|hash| hash.get(field).cloned()))
    }

    async fn hget_all(&self, key: &str) -> Result<FieldMap, StoreError> {
        self.ensure_available()?;
        Ok(self.hashes.lock().get(key).cloned().unwrap_or_default())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .hashes
            .lock()
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }

    async fn del(&self, keys: &[String]) -> Result<usize, StoreError> {
        self.ensure_available()?;
        let mut hashes = self.hashes.lock();
        Ok(keys.iter().filter(|key| hashes.remove(*key).is_some()).count())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        if let Some(tx) = self.channels.lock().get(channel) {
            // No receivers is not an error, same as PUBLISH returning 0
            let _ = tx.send(message.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, StoreError> {
        self.ensure_available()?;
        let rx = self
            .channels
            .lock()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        Ok(BroadcastStream::new(rx)
            .filter_map(|msg| futures_util::future::ready(msg.ok()))
            .boxed())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.channels.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_glob_match() {
        assert!(glob_match("bwa-bw1-*", "bwa-bw1-arena"));
        assert!(!glob_match("bwa-bw1-*", "bwa-bw10-arena"));
        assert!(glob_match("settings", "settings"));
        assert!(!glob_match("settings", "settings2"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*c*e", "abcde"));
        assert!(!glob_match("a*c*e", "abcd"));
    }

    #[tokio::test]
    async fn test_hash_operations() {
        let store = MemoryStore::new();
        store
            .hset_all("k", &[("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())])
            .await
            .unwrap();
        store.hset("k", "a", "3").await.unwrap();

        assert_eq!(store.hget("k", "a").await.unwrap(), Some("3".to_string()));
        assert_eq!(store.hget("k", "missing").await.unwrap(), None);
        assert_eq!(store.hget_all("k").await.unwrap().len(), 2);
        assert!(store.hget_all("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hset_nx_first_writer_wins() {
        let store = MemoryStore::new();
        assert!(store.hset_nx("settings", "channel", "news").await.unwrap());
        assert!(!store.hset_nx("settings", "channel", "other").await.unwrap());
        assert_eq!(store.hget("settings", "channel").await.unwrap(), Some("news".to_string()));
    }

    #[tokio::test]
    async fn test_keys_and_del() {
        let store = MemoryStore::new();
        store.hset("bwa-bw1-a", "f", "v").await.unwrap();
        store.hset("bwa-bw1-b", "f", "v").await.unwrap();
        store.hset("bwa-bw10-a", "f", "v").await.unwrap();

        let mut keys = store.keys("bwa-bw1-*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["bwa-bw1-a".to_string(), "bwa-bw1-b".to_string()]);

        assert_eq!(store.del(&keys).await.unwrap(), 2);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryStore::new();
        store.set_available(false);
        let err = assert_err!(store.hset("k", "f", "v").await);
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.subscribe("c").await.is_err());

        store.set_available(true);
        assert_ok!(store.hset("k", "f", "v").await);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = MemoryStore::new();
        store.hset("k", "f", "v").await.unwrap();
        store.close().await;

        let err = assert_err!(store.hget("k", "f").await);
        assert!(matches!(err, StoreError::Closed));
        assert!(matches!(store.publish("bw2023", "late").await, Err(StoreError::Closed)));
        assert!(store.subscribe("bw2023").await.is_err());
        // Coming back online does not reopen it
        store.set_available(true);
        assert_err!(store.hset("k", "f", "w").await);
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let store = MemoryStore::new();
        // Publishing without subscribers is fine
        store.publish("bw2023", "lost").await.unwrap();

        let mut stream = store.subscribe("bw2023").await.unwrap();
        store.publish("bw2023", "hello").await.unwrap();
        store.publish("other", "ignored").await.unwrap();
        store.publish("bw2023", "world").await.unwrap();

        assert_eq!(stream.next().await, Some("hello".to_string()));
        assert_eq!(stream.next().await, Some("world".to_string()));

        store.drop_subscribers("bw2023");
        assert_eq!(stream.next().await, None);
    }
}
