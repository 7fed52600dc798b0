//! Redis-backed [`SharedStore`]
//!
//! Commands go through a multiplexed `ConnectionManager` (reconnects on its
//! own). Every subscription opens its own pub/sub connection, since a
//! subscribed connection can no longer issue ordinary commands. Closing drops
//! the command connection; later calls fail with [`StoreError::Closed`].

use futures_util::StreamExt;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::config::RedisConfig;
use crate::net::store::{FieldMap, MessageStream, SharedStore, StoreError};

pub struct RedisStore {
    client: redis::Client,
    data: Mutex<Option<ConnectionManager>>,
}

impl RedisStore {
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url())?;
        let data = ConnectionManager::new(client.clone()).await?;
        info!("Connected to redis at {}:{}", config.host, config.port);
        Ok(Self {
            client,
            data: Mutex::new(Some(data)),
        })
    }

    fn data(&self) -> Result<ConnectionManager, StoreError> {
        self.data.lock().clone().ok_or(StoreError::Closed)
    }
}

#[async_trait::async_trait]
impl SharedStore for RedisStore {
    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut con = self.data()?;
        let _: () = con.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut con = self.data()?;
        let _: () = con.hset(key, field, value).await?;
        Ok(())
    }

    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut con = self.data()?;
        Ok(con.hset_nx(key, field, value).await?)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.data()?;
        Ok(con.hget(key, field).await?)
    }

    async fn hget_all(&self, key: &str) -> Result<FieldMap, StoreError> {
        let mut con = self.data()?;
        Ok(con.hgetall(key).await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.data()?;
        Ok(con.keys(pattern).await?)
    }

    async fn del(&self, keys: &[String]) -> Result<usize, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut con = self.data()?;
        Ok(con.del(keys).await?)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        let mut con = self.data()?;
        let receivers: i64 = con.publish(channel, message).await?;
        debug!("Published on {} to {} receivers", channel, receivers);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, StoreError> {
        if self.data.lock().is_none() {
            return Err(StoreError::Closed);
        }
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        debug!("Subscribed to redis channel {}", channel);

        Ok(pubsub
            .into_on_message()
            .filter_map(|msg| futures_util::future::ready(msg.get_payload::<String>().ok()))
            .boxed())
    }

    async fn close(&self) {
        // In-flight commands hold their own clone; the socket closes after them
        if self.data.lock().take().is_some() {
            debug!("Closed redis command connection");
        }
    }
}
