//! Startup wiring between the store and the registry.
//!
//! On startup the registry is filled from the store when it already holds
//! lights, and from the configured seed fleet otherwise. On shutdown the
//! sync queue is drained first, then every light is written back so the
//! next start resumes where this one ended.

use signalgrid_core::config::InfrastructureConfig;
use signalgrid_core::registry::LightRegistry;
use signalgrid_core::sync::{LightStore, MemoryStore, SyncStats};
use signalgrid_store::DragonflyStore;
use signalgrid_types::TrafficLightInit;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::EngineError;

/// How the registry was filled at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetSource {
    /// Lights were restored from the store.
    Restored {
        /// Lights restored.
        restored: usize,
        /// Stored lights that were rejected.
        skipped: usize,
    },
    /// The store was empty; the seed fleet was registered.
    Seeded {
        /// Lights registered.
        seeded: usize,
    },
}

impl FleetSource {
    /// Number of lights placed in the registry.
    pub const fn loaded(&self) -> usize {
        match self {
            Self::Restored { restored, .. } => *restored,
            Self::Seeded { seeded } => *seeded,
        }
    }

    /// Number of stored lights that were rejected.
    pub const fn skipped(&self) -> usize {
        match self {
            Self::Restored { skipped, .. } => *skipped,
            Self::Seeded { .. } => 0,
        }
    }
}

/// Open the configured store.
///
/// Persistence is optional: when it is disabled, or Dragonfly cannot be
/// reached, the controller runs on a process-local store.
pub async fn open_store(infra: &InfrastructureConfig) -> LightStore {
    if !infra.persistence_enabled {
        info!("Persistence disabled, using in-memory store");
        return LightStore::Memory(MemoryStore::new());
    }

    match DragonflyStore::connect(&infra.dragonfly_url).await {
        Ok(store) => {
            info!(url = %infra.dragonfly_url, "Connected to Dragonfly");
            LightStore::Dragonfly(store)
        }
        Err(e) => {
            warn!(
                url = %infra.dragonfly_url,
                error = %e,
                "Dragonfly unreachable, falling back to in-memory store"
            );
            LightStore::Memory(MemoryStore::new())
        }
    }
}

/// Fill `registry` from `store`, or from `seeds` when the store is empty.
///
/// A stored light that cannot be restored is skipped with a warning. A
/// seed light that cannot be registered is a configuration error.
pub async fn load_fleet(
    registry: &LightRegistry,
    store: &LightStore,
    seeds: &[TrafficLightInit],
) -> Result<FleetSource, EngineError> {
    let stored = store.load_all().await?;

    if stored.is_empty() {
        for seed in seeds {
            registry.register(seed.clone())?;
        }
        info!(seeded = seeds.len(), backend = store.name(), "Seed fleet registered");
        return Ok(FleetSource::Seeded {
            seeded: seeds.len(),
        });
    }

    let mut restored: usize = 0;
    let mut skipped: usize = 0;
    for light in stored {
        let id = light.id.clone();
        match registry.restore(light) {
            Ok(_) => restored = restored.saturating_add(1),
            Err(e) => {
                skipped = skipped.saturating_add(1);
                warn!(light_id = %id, error = %e, "Skipping stored light");
            }
        }
    }
    info!(restored, skipped, backend = store.name(), "Fleet restored from store");
    Ok(FleetSource::Restored { restored, skipped })
}

/// Detach the registry's sync worker and wait for it to flush its queue.
///
/// Returns `None` if the worker task panicked or was cancelled.
pub async fn drain_sync(
    registry: &LightRegistry,
    worker: JoinHandle<SyncStats>,
) -> Option<SyncStats> {
    if !registry.close_sync() {
        warn!("No sync worker attached to the registry");
    }
    match worker.await {
        Ok(stats) => {
            info!(
                saved = stats.saved,
                deleted = stats.deleted,
                coalesced = stats.coalesced,
                failed = stats.failed,
                "Sync queue drained"
            );
            Some(stats)
        }
        Err(e) => {
            warn!(error = %e, "Sync worker did not finish cleanly");
            None
        }
    }
}

/// Write every light to `store`. Returns the number of failed writes.
pub async fn save_fleet(registry: &LightRegistry, store: &LightStore) -> usize {
    let mut failed: usize = 0;
    for light in registry.list() {
        if let Err(e) = store.save(&light).await {
            failed = failed.saturating_add(1);
            warn!(light_id = %light.id, error = %e, "Final save failed");
        }
    }
    failed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use signalgrid_core::config::ControllerConfig;
    use signalgrid_core::sync;
    use signalgrid_types::{Color, LightId, Mode, Status, TrafficLight};

    use super::*;

    fn seeds() -> Vec<TrafficLightInit> {
        vec![
            TrafficLightInit::new("Main & 5th", "Downtown")
                .with_id(LightId::parse("tl-001").unwrap()),
            TrafficLightInit::new("Broadway & Park", "Midtown")
                .with_id(LightId::parse("tl-002").unwrap())
                .with_color(Color::Green),
        ]
    }

    fn stored(id: &str, name: &str) -> TrafficLight {
        TrafficLight {
            id: LightId::parse(id).unwrap(),
            name: name.to_owned(),
            location: String::from("North"),
            mode: Mode::Manual,
            status: Status::Online,
            color: Color::Yellow,
            remaining_time: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_store_registers_seeds() {
        let registry = LightRegistry::new(&ControllerConfig::default());
        let store = LightStore::Memory(MemoryStore::new());

        let source = load_fleet(&registry, &store, &seeds()).await.unwrap();

        assert_eq!(source, FleetSource::Seeded { seeded: 2 });
        assert_eq!(source.loaded(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn stored_lights_take_precedence_over_seeds() {
        let registry = LightRegistry::new(&ControllerConfig::default());
        let store = LightStore::Memory(MemoryStore::with_lights([
            stored("tl-003", "Highway 101 Exit"),
            stored("tl-009", "  "),
        ]));

        let source = load_fleet(&registry, &store, &seeds()).await.unwrap();

        assert_eq!(
            source,
            FleetSource::Restored {
                restored: 1,
                skipped: 1
            }
        );
        assert_eq!(source.skipped(), 1);
        let light = registry.get(&LightId::parse("tl-003").unwrap()).unwrap();
        assert_eq!(light.mode, Mode::Manual);
        assert_eq!(light.color, Color::Yellow);
    }

    #[tokio::test]
    async fn duplicate_seed_is_an_error() {
        let registry = LightRegistry::new(&ControllerConfig::default());
        let store = LightStore::Memory(MemoryStore::new());
        let mut fleet = seeds();
        fleet.push(fleet.first().cloned().unwrap());

        let result = load_fleet(&registry, &store, &fleet).await;

        assert!(matches!(result, Err(EngineError::Control { .. })));
    }

    #[tokio::test]
    async fn save_fleet_writes_every_light() {
        let registry = LightRegistry::new(&ControllerConfig::default());
        let memory = MemoryStore::new();
        let store = LightStore::Memory(memory.clone());
        load_fleet(&registry, &store, &seeds()).await.unwrap();

        assert_eq!(save_fleet(&registry, &store).await, 0);
        assert_eq!(memory.len(), 2);

        memory.set_reject_writes(true);
        assert_eq!(save_fleet(&registry, &store).await, 2);
    }

    #[tokio::test]
    async fn drain_sync_flushes_queued_deletes() {
        let memory = MemoryStore::new();
        let store = LightStore::Memory(memory.clone());
        let (handle, worker) = sync::spawn_sync_worker(store.clone(), 64);
        let registry = LightRegistry::new(&ControllerConfig::default()).with_sync(handle);
        load_fleet(&registry, &store, &seeds()).await.unwrap();
        let removed = LightId::parse("tl-001").unwrap();
        registry.deregister(&removed).unwrap();

        let stats = drain_sync(&registry, worker).await.unwrap();

        assert_eq!(stats.failed, 0);
        assert!(memory.get(&removed).is_none());
        assert!(memory.get(&LightId::parse("tl-002").unwrap()).is_some());
        assert!(!registry.close_sync());
    }

    #[tokio::test]
    async fn disabled_persistence_uses_memory() {
        let store = open_store(&InfrastructureConfig::default()).await;
        assert_eq!(store.name(), "memory");
    }
}
