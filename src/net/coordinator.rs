//! Distributed coordination layer
//!
//! Owns this server's arena records in the shared store, the fleet settings
//! hash, and the channel listener. Every operation is best effort: store
//! failures are logged and reported as `false` or [`SettingStatus::Unavailable`],
//! never propagated into gameplay.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::game::constants::store::SETTINGS_KEY;
use crate::metrics::Metrics;
use crate::net::listener::{spawn_listener, MessageHandler};
use crate::net::protocol::{record_key, server_pattern, ChannelMessage, DistributedRecord, SERVER_NAME_FIELD};
use crate::net::store::{SharedStore, StoreError};

/// Outcome of comparing a local setting against the fleet value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingStatus {
    /// Nothing was stored; the local value is now the fleet value
    Stored,
    Matches,
    /// Fleet value differs and was left untouched
    Mismatch { stored: String },
    /// Store could not be reached
    Unavailable,
}

impl SettingStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SettingStatus::Stored | SettingStatus::Matches)
    }
}

pub struct Coordinator {
    server_id: String,
    channel: String,
    store: Arc<dyn SharedStore>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create the layer and sweep records left over from an unclean shutdown
    pub async fn open(
        server_id: impl Into<String>,
        channel: impl Into<String>,
        store: Arc<dyn SharedStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let coordinator = Self {
            server_id: server_id.into(),
            channel: channel.into(),
            store,
            metrics,
            cancel: CancellationToken::new(),
            listener: Mutex::new(None),
        };

        let swept = coordinator.retract_all().await;
        if swept > 0 {
            info!("Swept {} stale arena records for server {}", swept, coordinator.server_id);
        }
        coordinator
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn store_failed(&self, operation: &str, error: &StoreError) {
        Metrics::incr(&self.metrics.store_errors);
        warn!("Shared store {} failed: {}", operation, error);
    }

    /// Write (or overwrite) an arena record. Returns false on store failure.
    pub async fn publish(&self, record: &DistributedRecord) -> bool {
        match self.store.hset_all(&record.key(), &record.fields()).await {
            Ok(()) => {
                Metrics::incr(&self.metrics.records_published);
                debug!("Stored arena record {} ({})", record.key(), record.arena_status);
                true
            }
            Err(e) => {
                Metrics::incr(&self.metrics.publish_failures);
                self.store_failed("publish", &e);
                false
            }
        }
    }

    /// Delete the record of one arena
    pub async fn retract(&self, arena_identifier: &str) -> bool {
        let key = record_key(&self.server_id, arena_identifier);
        match self.store.del(std::slice::from_ref(&key)).await {
            Ok(removed) => {
                if removed > 0 {
                    Metrics::incr(&self.metrics.records_retracted);
                }
                debug!("Deleted arena record {}", key);
                true
            }
            Err(e) => {
                self.store_failed("retract", &e);
                false
            }
        }
    }

    /// Delete every record owned by this server. Returns how many were removed.
    ///
    /// The key pattern also matches servers whose id extends ours with a dash
    /// (`bw` vs `bw-1`), so only records naming this server are deleted.
    pub async fn retract_all(&self) -> usize {
        let candidates = match self.store.keys(&server_pattern(&self.server_id)).await {
            Ok(keys) => keys,
            Err(e) => {
                self.store_failed("sweep", &e);
                return 0;
            }
        };

        let mut keys = Vec::with_capacity(candidates.len());
        for key in candidates {
            match self.store.hget(&key, SERVER_NAME_FIELD).await {
                Ok(Some(owner)) if owner == self.server_id => keys.push(key),
                Ok(_) => debug!("Skipping record {} owned by another server", key),
                Err(e) => {
                    self.store_failed("sweep", &e);
                    return 0;
                }
            }
        }
        if keys.is_empty() {
            return 0;
        }

        match self.store.del(&keys).await {
            Ok(removed) => {
                self.metrics
                    .records_retracted
                    .fetch_add(removed as u64, std::sync::atomic::Ordering::Relaxed);
                for key in &keys {
                    debug!("Deleted arena record {}", key);
                }
                removed
            }
            Err(e) => {
                self.store_failed("sweep", &e);
                0
            }
        }
    }

    /// Agree on a fleet setting: the first writer stores its value, everyone
    /// after compares. A mismatch is reported, never overwritten.
    pub async fn check_setting(&self, name: &str, expected: &str) -> SettingStatus {
        match self.store.hset_nx(SETTINGS_KEY, name, expected).await {
            Ok(true) => {
                debug!("Stored fleet setting '{}' = '{}'", name, expected);
                SettingStatus::Stored
            }
            Ok(false) => match self.store.hget(SETTINGS_KEY, name).await {
                Ok(Some(stored)) if stored == expected => SettingStatus::Matches,
                Ok(Some(stored)) => {
                    Metrics::incr(&self.metrics.setting_mismatches);
                    warn!(
                        "Setting '{}' does not match the stored value: fleet has '{}', local is '{}'",
                        name, stored, expected
                    );
                    SettingStatus::Mismatch { stored }
                }
                Ok(None) => {
                    warn!("Setting '{}' vanished while being checked", name);
                    SettingStatus::Unavailable
                }
                Err(e) => {
                    self.store_failed("check_setting", &e);
                    SettingStatus::Unavailable
                }
            },
            Err(e) => {
                self.store_failed("check_setting", &e);
                SettingStatus::Unavailable
            }
        }
    }

    /// Overwrite a fleet setting
    pub async fn store_setting(&self, name: &str, value: &str) -> bool {
        match self.store.hset(SETTINGS_KEY, name, value).await {
            Ok(()) => true,
            Err(e) => {
                self.store_failed("store_setting", &e);
                false
            }
        }
    }

    pub async fn retrieve_setting(&self, name: &str) -> Option<String> {
        match self.store.hget(SETTINGS_KEY, name).await {
            Ok(value) => value,
            Err(e) => {
                self.store_failed("retrieve_setting", &e);
                None
            }
        }
    }

    async fn send(&self, payload: &str) -> bool {
        match self.store.publish(&self.channel, payload).await {
            Ok(()) => {
                Metrics::incr(&self.metrics.messages_sent);
                debug!("Sent message on channel {}: {}", self.channel, payload);
                true
            }
            Err(e) => {
                self.store_failed("notify", &e);
                false
            }
        }
    }

    /// Broadcast a plain message. Empty messages are ignored.
    pub async fn notify(&self, message: &str) -> bool {
        if message.is_empty() {
            return false;
        }
        self.send(message).await
    }

    /// Broadcast a payload for a named addon
    pub async fn notify_addon(&self, addon_name: &str, data: &serde_json::Value) -> bool {
        match ChannelMessage::addon(addon_name, data).encode() {
            Ok(payload) => self.send(&payload).await,
            Err(e) => {
                warn!("Failed to encode addon message for '{}': {}", addon_name, e);
                false
            }
        }
    }

    /// Start the channel listener. Returns false if it is already running.
    pub fn connect(&self, handler: Arc<dyn MessageHandler>) -> bool {
        let mut listener = self.listener.lock();
        if listener.is_some() || self.cancel.is_cancelled() {
            return false;
        }
        *listener = Some(spawn_listener(
            self.store.clone(),
            self.channel.clone(),
            handler,
            self.metrics.clone(),
            self.cancel.child_token(),
        ));
        true
    }

    /// Retract all records, stop the listener, then release the store
    pub async fn close(&self) {
        info!("Closing coordination layer");
        self.retract_all().await;

        self.cancel.cancel();
        let listener = self.listener.lock().take();
        if let Some(join) = listener {
            if let Err(e) = join.await {
                warn!("Channel listener ended abnormally: {}", e);
            }
        }

        self.store.close().await;
    }
}
