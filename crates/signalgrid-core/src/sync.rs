//! Persistence sync between the registry and a durable store.
//!
//! The registry never awaits the store. Every state change is converted
//! into a [`SyncJob`] and handed to a [`SyncHandle`], which enqueues it
//! with `try_send` on a bounded channel. A background worker drains the
//! channel, keeps only the newest job per light, and writes to the
//! [`LightStore`]. A full queue or a failed write is logged and dropped;
//! local state is never rolled back.
//!
//! In the other direction, [`run_remote_feed`] merges changes written by
//! other clients into the registry with last-writer-wins semantics.
//!
//! # Architecture
//!
//! ```text
//! LightRegistry --try_send--> [bounded mpsc] --> sync worker --> LightStore
//!       ^                                                           |
//!       +------------- run_remote_feed <-- change feed -------------+
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use signalgrid_store::{DragonflyStore, StoreError};
use signalgrid_types::{LightEvent, LightEventKind, LightId, RemoteUpdate, TrafficLight};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::light::RemoteOutcome;
use crate::registry::LightRegistry;

/// Capacity of the in-memory store's change channel.
const MEMORY_CHANGES_CAPACITY: usize = 256;

/// Errors raised at the sync boundary. Never surfaced to command callers.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The sync queue is full; the job was dropped.
    #[error("sync queue full, dropped update for light {id}")]
    QueueFull {
        /// The light whose update was dropped.
        id: LightId,
    },

    /// The sync worker has stopped.
    #[error("sync worker stopped, dropped update for light {id}")]
    QueueClosed {
        /// The light whose update was dropped.
        id: LightId,
    },

    /// The `Dragonfly` store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// The in-memory store refused the write.
    #[error("write rejected: {reason}")]
    Rejected {
        /// Why the write was refused.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Store backends
// ---------------------------------------------------------------------------

/// Durable store backend.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not object-safe without boxing.
#[derive(Clone)]
pub enum LightStore {
    /// Process-local store for tests and storeless deployments.
    Memory(MemoryStore),
    /// `Dragonfly` (Redis-compatible) store.
    Dragonfly(DragonflyStore),
}

impl LightStore {
    /// Short backend name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Dragonfly(_) => "dragonfly",
        }
    }

    /// Load every stored light, sorted by id.
    pub async fn load_all(&self) -> Result<Vec<TrafficLight>, SyncError> {
        match self {
            Self::Memory(store) => Ok(store.load_all()),
            Self::Dragonfly(store) => Ok(store.load_all_lights().await?),
        }
    }

    /// Store one light snapshot, replacing any previous one.
    pub async fn save(&self, light: &TrafficLight) -> Result<(), SyncError> {
        match self {
            Self::Memory(store) => store.save(light),
            Self::Dragonfly(store) => Ok(store.save_light(light).await?),
        }
    }

    /// Remove one light.
    pub async fn delete(&self, id: &LightId) -> Result<(), SyncError> {
        match self {
            Self::Memory(store) => store.delete(id),
            Self::Dragonfly(store) => Ok(store.delete_light(id).await?),
        }
    }

    /// Subscribe to changes written by other clients.
    pub async fn subscribe_changes(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Receiver<RemoteUpdate>, SyncError> {
        match self {
            Self::Memory(store) => Ok(store.subscribe_changes()),
            Self::Dragonfly(store) => Ok(store.subscribe_changes(capacity).await?),
        }
    }
}

/// In-memory [`LightStore`] backend.
///
/// Clones share the same contents.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Debug)]
struct MemoryInner {
    lights: DashMap<LightId, TrafficLight>,
    changes: broadcast::Sender<RemoteUpdate>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(MEMORY_CHANGES_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                lights: DashMap::new(),
                changes,
                reject_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Create a store pre-filled with `lights`.
    pub fn with_lights(lights: impl IntoIterator<Item = TrafficLight>) -> Self {
        let store = Self::new();
        for light in lights {
            store.inner.lights.insert(light.id.clone(), light);
        }
        store
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_reject_writes(&self, reject: bool) {
        self.inner.reject_writes.store(reject, Ordering::Release);
    }

    /// Read one stored light.
    pub fn get(&self, id: &LightId) -> Option<TrafficLight> {
        self.inner.lights.get(id).map(|entry| entry.value().clone())
    }

    /// Number of stored lights.
    pub fn len(&self) -> usize {
        self.inner.lights.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lights.is_empty()
    }

    /// Announce a change as if another client had written it.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish_change(&self, update: RemoteUpdate) -> usize {
        self.inner.changes.send(update).unwrap_or(0)
    }

    fn load_all(&self) -> Vec<TrafficLight> {
        let mut lights: Vec<TrafficLight> = self
            .inner
            .lights
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        lights.sort_by(|a, b| a.id.cmp(&b.id));
        lights
    }

    fn save(&self, light: &TrafficLight) -> Result<(), SyncError> {
        self.check_writable()?;
        self.inner.lights.insert(light.id.clone(), light.clone());
        Ok(())
    }

    fn delete(&self, id: &LightId) -> Result<(), SyncError> {
        self.check_writable()?;
        self.inner.lights.remove(id);
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<RemoteUpdate> {
        self.inner.changes.subscribe()
    }

    fn check_writable(&self) -> Result<(), SyncError> {
        if self.inner.reject_writes.load(Ordering::Acquire) {
            Err(SyncError::Rejected {
                reason: "memory store is read-only".to_owned(),
            })
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Outbound: registry -> store
// ---------------------------------------------------------------------------

/// A pending store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncJob {
    /// Store the snapshot.
    Save(TrafficLight),
    /// Remove the light.
    Delete(LightId),
}

impl SyncJob {
    /// The write an event calls for.
    pub fn from_event(event: &LightEvent) -> Self {
        match event.kind {
            LightEventKind::Deregistered => Self::Delete(event.light.id.clone()),
            _ => Self::Save(event.light.clone()),
        }
    }

    /// The light this job writes.
    pub const fn light_id(&self) -> &LightId {
        match self {
            Self::Save(light) => &light.id,
            Self::Delete(id) => id,
        }
    }
}

/// Fire-and-forget sender of sync jobs. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncJob>,
}

impl SyncHandle {
    /// Create a handle and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SyncJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue the write `event` calls for without waiting.
    pub fn submit(&self, event: &LightEvent) -> Result<(), SyncError> {
        let job = SyncJob::from_event(event);
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => SyncError::QueueFull {
                id: job.light_id().clone(),
            },
            mpsc::error::TrySendError::Closed(job) => SyncError::QueueClosed {
                id: job.light_id().clone(),
            },
        })
    }
}

/// Counters reported by the sync worker when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Snapshots written.
    pub saved: u64,
    /// Lights removed.
    pub deleted: u64,
    /// Jobs superseded by a newer job for the same light before writing.
    pub coalesced: u64,
    /// Writes the store rejected.
    pub failed: u64,
}

/// Spawn the sync worker and return the handle that feeds it.
///
/// The worker stops once every clone of the handle is dropped and the
/// queue is drained.
pub fn spawn_sync_worker(store: LightStore, capacity: usize) -> (SyncHandle, JoinHandle<SyncStats>) {
    let (handle, rx) = SyncHandle::channel(capacity);
    info!(backend = store.name(), capacity, "Sync worker starting");
    let worker = tokio::spawn(run_sync_worker(store, rx));
    (handle, worker)
}

/// Drain `rx` into `store`, coalescing queued jobs per light.
pub async fn run_sync_worker(store: LightStore, mut rx: mpsc::Receiver<SyncJob>) -> SyncStats {
    let mut stats = SyncStats::default();

    while let Some(first) = rx.recv().await {
        let mut pending: BTreeMap<LightId, SyncJob> = BTreeMap::new();
        pending.insert(first.light_id().clone(), first);
        while let Ok(job) = rx.try_recv() {
            if pending.insert(job.light_id().clone(), job).is_some() {
                stats.coalesced = stats.coalesced.saturating_add(1);
            }
        }

        for job in pending.into_values() {
            let result = match &job {
                SyncJob::Save(light) => store.save(light).await,
                SyncJob::Delete(id) => store.delete(id).await,
            };
            match (result, &job) {
                (Ok(()), SyncJob::Save(_)) => stats.saved = stats.saved.saturating_add(1),
                (Ok(()), SyncJob::Delete(_)) => stats.deleted = stats.deleted.saturating_add(1),
                (Err(e), _) => {
                    stats.failed = stats.failed.saturating_add(1);
                    warn!(light_id = %job.light_id(), error = %e, "sync write failed");
                }
            }
        }
    }

    debug!(
        saved = stats.saved,
        deleted = stats.deleted,
        coalesced = stats.coalesced,
        failed = stats.failed,
        "Sync worker stopped"
    );
    stats
}

// ---------------------------------------------------------------------------
// Inbound: store -> registry
// ---------------------------------------------------------------------------

/// Merge remote changes into the registry until the feed closes.
pub async fn run_remote_feed(
    registry: Arc<LightRegistry>,
    mut changes: broadcast::Receiver<RemoteUpdate>,
) {
    loop {
        match changes.recv().await {
            Ok(update) => match registry.apply_remote(&update) {
                RemoteOutcome::Applied => {
                    debug!(light_id = %update.id, "merged remote update");
                }
                RemoteOutcome::Stale => {
                    warn!(
                        light_id = %update.id,
                        updated_at = %update.updated_at,
                        "ignoring stale remote update"
                    );
                }
                RemoteOutcome::Empty => {
                    debug!(light_id = %update.id, "ignoring empty remote update");
                }
                RemoteOutcome::UnknownLight => {
                    warn!(light_id = %update.id, "ignoring remote update for unknown light");
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "remote change feed lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    info!("Remote change feed closed");
}
