//! `Dragonfly` (Redis-compatible) light state and change feed.
//!
//! `Dragonfly` holds the last synced snapshot of every registered light and
//! relays change notifications from other writers.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `light:{id}:state` | JSON | Full light snapshot |
//! | `lights:index` | Set | Ids of every stored light |
//! | `lights:changes` | Pub/Sub | JSON `RemoteUpdate` messages from other writers |

use fred::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use signalgrid_types::{LightId, RemoteUpdate, TrafficLight};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::StoreError;

/// Set holding the id of every stored light.
pub const LIGHT_INDEX_KEY: &str = "lights:index";

/// Pub/sub channel carrying externally originated changes.
pub const CHANGES_CHANNEL: &str = "lights:changes";

/// Key of one light's JSON snapshot.
pub fn light_state_key(id: &LightId) -> String {
    format!("light:{id}:state")
}

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Holds two [`fred::prelude::Client`]s: one for commands and one that is
/// dedicated to the change subscription, since a subscribed connection
/// cannot issue regular commands.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
    subscriber: Client,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config.clone()).build()?;
        client.init().await?;
        let subscriber = Builder::from_config(config).build()?;
        subscriber.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client, subscriber })
    }

    // =========================================================================
    // Generic JSON get/set/delete
    // =========================================================================

    /// Serialize `value` as JSON and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if serialization fails.
    /// Returns [`StoreError::Dragonfly`] if the write fails.
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }

    /// Read the value at `key` and deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] if the key does not exist.
    /// Returns [`StoreError::Serialization`] if deserialization fails.
    /// Returns [`StoreError::Dragonfly`] if the read fails.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        let value: Option<String> = self.client.get(key).await?;
        value.map_or_else(
            || Err(StoreError::KeyNotFound(key.to_owned())),
            |s| Ok(serde_json::from_str(&s)?),
        )
    }

    // =========================================================================
    // Light State -- light:{id}:state, lights:index
    // =========================================================================

    /// Store a light snapshot and add its id to `lights:index`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or either write fails.
    pub async fn save_light(&self, light: &TrafficLight) -> Result<(), StoreError> {
        self.set_json(&light_state_key(&light.id), light).await?;
        let _: u32 = self.client.sadd(LIGHT_INDEX_KEY, light.id.as_str()).await?;
        Ok(())
    }

    /// Read one light snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] if the light is not stored.
    /// Returns [`StoreError`] if deserialization or the read fails.
    pub async fn load_light(&self, id: &LightId) -> Result<TrafficLight, StoreError> {
        self.get_json(&light_state_key(id)).await
    }

    /// Remove a light snapshot and its `lights:index` entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if a delete fails.
    pub async fn delete_light(&self, id: &LightId) -> Result<(), StoreError> {
        let _: u32 = self.client.del(light_state_key(id).as_str()).await?;
        let _: u32 = self.client.srem(LIGHT_INDEX_KEY, id.as_str()).await?;
        Ok(())
    }

    /// Get every id in `lights:index`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the index holds a malformed id.
    /// Returns [`StoreError::Dragonfly`] if the read fails.
    pub async fn light_ids(&self) -> Result<Vec<LightId>, StoreError> {
        let members: Vec<String> = self.client.smembers(LIGHT_INDEX_KEY).await?;
        let mut ids = Vec::with_capacity(members.len());
        for m in members {
            let id = LightId::try_from(m)
                .map_err(|e| StoreError::Config(format!("{e} in {LIGHT_INDEX_KEY}")))?;
            ids.push(id);
        }
        ids.sort();
        Ok(ids)
    }

    /// Read every indexed light snapshot, sorted by id.
    ///
    /// Index entries whose snapshot key is missing are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a read or deserialization fails.
    pub async fn load_all_lights(&self) -> Result<Vec<TrafficLight>, StoreError> {
        let ids = self.light_ids().await?;
        let mut lights = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.load_light(id).await {
                Ok(light) => lights.push(light),
                Err(StoreError::KeyNotFound(key)) => {
                    tracing::warn!(light_id = %id, key = %key, "indexed light has no snapshot");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(lights)
    }

    // =========================================================================
    // Change Feed -- lights:changes
    // =========================================================================

    /// Publish a change on `lights:changes`.
    ///
    /// Used by writers other than the controller, and by tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the publish fails.
    pub async fn publish_change(&self, update: &RemoteUpdate) -> Result<(), StoreError> {
        let json = serde_json::to_string(update)?;
        let _: i64 = self.client.publish(CHANGES_CHANNEL, json.as_str()).await?;
        Ok(())
    }

    /// Subscribe to `lights:changes` and decode messages into
    /// [`RemoteUpdate`]s.
    ///
    /// Spawns a forwarding task that ends when every returned receiver is
    /// dropped or the connection's message stream closes. Messages that do
    /// not decode are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the subscription fails.
    pub async fn subscribe_changes(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Receiver<RemoteUpdate>, StoreError> {
        let mut messages = self.subscriber.message_rx();
        self.subscriber.subscribe(CHANGES_CHANNEL).await?;

        let (tx, rx) = broadcast::channel(capacity.max(1));
        tokio::spawn(async move {
            loop {
                match messages.recv().await {
                    Ok(message) => match decode_change(message.value) {
                        Ok(update) => {
                            if tx.send(update).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "dropping undecodable change message"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "change subscription lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("change subscription ended");
        });

        tracing::info!(channel = CHANGES_CHANNEL, "Subscribed to light changes");
        Ok(rx)
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), StoreError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }

    /// Return a reference to the underlying command [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

fn decode_change(value: Value) -> Result<RemoteUpdate, StoreError> {
    let json: String = value.convert()?;
    Ok(serde_json::from_str(&json)?)
}
