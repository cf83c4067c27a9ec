//! Light registry and tick fan-out.
//!
//! The [`LightRegistry`] owns every [`LightMachine`] and is the sole entry
//! point for ticks, commands, queries and remote merges. Machines live in
//! a sharded concurrent map; every mutation runs while holding that
//! light's entry guard, so a tick and a command never interleave on the
//! same light while unrelated lights proceed in parallel.
//!
//! Each successful mutation produces a [`LightEvent`] that is, in order:
//! appended to the light's recent-event log, handed to the sync worker
//! (fire-and-forget) and broadcast to live subscribers. Events for one
//! light are emitted under its guard, so subscribers see them in mutation
//! order.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use signalgrid_types::{
    Color, FleetSummary, LightEvent, LightEventKind, LightId, Mode, RemoteUpdate, Status,
    TrafficLight, TrafficLightInit,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clock::Tick;
use crate::config::{ControllerConfig, DwellConfig};
use crate::error::ControlError;
use crate::light::{LightMachine, RemoteOutcome, TickOutcome};
use crate::sync::SyncHandle;

/// Counts produced by one tick fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// The tick number delivered.
    pub tick: u64,
    /// Lights whose countdown was decremented.
    pub counted_down: u32,
    /// Lights whose color advanced.
    pub advanced: u32,
    /// Lights that ignored the tick (frozen or already past it).
    pub skipped: u32,
}

/// Where a change came from. Remote changes are not echoed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Local,
    Remote,
}

/// Registry of all traffic lights.
#[derive(Debug)]
pub struct LightRegistry {
    lights: DashMap<LightId, LightMachine>,
    retired: DashSet<LightId>,
    logs: DashMap<LightId, VecDeque<LightEvent>>,
    log_capacity: usize,
    dwell: DwellConfig,
    events: broadcast::Sender<LightEvent>,
    sync: RwLock<Option<SyncHandle>>,
}

impl LightRegistry {
    /// Create an empty registry with no sync worker attached.
    pub fn new(config: &ControllerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            lights: DashMap::new(),
            retired: DashSet::new(),
            logs: DashMap::new(),
            log_capacity: config.event_log_capacity,
            dwell: config.dwell,
            events,
            sync: RwLock::new(None),
        }
    }

    /// Forward every local change to `sync`.
    #[must_use]
    pub fn with_sync(mut self, sync: SyncHandle) -> Self {
        self.sync = RwLock::new(Some(sync));
        self
    }

    /// Detach the sync worker so its queue closes once drained.
    ///
    /// Later changes are no longer forwarded. Returns `false` if no worker
    /// was attached.
    pub fn close_sync(&self) -> bool {
        self.sync
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// The dwell table used for new and reseeded countdowns.
    pub const fn dwell(&self) -> DwellConfig {
        self.dwell
    }

    /// Number of registered lights.
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Whether no light is registered.
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Subscribe to the live event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<LightEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Register a new light and return its id.
    ///
    /// Fails with [`ControlError::DuplicateId`] if the id is registered or
    /// was retired, and [`ControlError::InvalidInit`] for a blank name.
    pub fn register(&self, init: TrafficLightInit) -> Result<LightId, ControlError> {
        let machine = LightMachine::new(init, self.dwell, Utc::now())?;
        self.insert(machine, Origin::Local)
    }

    /// Re-register a light from a persisted snapshot without writing it
    /// back to the store.
    pub fn restore(&self, light: TrafficLight) -> Result<LightId, ControlError> {
        if light.name.trim().is_empty() {
            return Err(ControlError::InvalidInit {
                reason: format!("stored light {} has an empty name", light.id),
            });
        }
        self.insert(LightMachine::from_snapshot(light, self.dwell), Origin::Remote)
    }

    fn insert(&self, machine: LightMachine, origin: Origin) -> Result<LightId, ControlError> {
        let id = machine.id().clone();
        match self.lights.entry(id.clone()) {
            Entry::Occupied(_) => Err(ControlError::DuplicateId { id }),
            Entry::Vacant(_) if self.retired.contains(&id) => Err(ControlError::DuplicateId { id }),
            Entry::Vacant(slot) => {
                let snapshot = machine.snapshot();
                info!(
                    light_id = %id,
                    name = %snapshot.name,
                    mode = %snapshot.mode,
                    status = %snapshot.status,
                    color = %snapshot.color,
                    "Light registered"
                );
                // Publish while the entry is held so no tick event precedes it.
                let guard = slot.insert(machine);
                self.publish(LightEvent::new(LightEventKind::Registered, snapshot, None), origin);
                drop(guard);
                Ok(id)
            }
        }
    }

    /// Remove a light and retire its id.
    pub fn deregister(&self, id: &LightId) -> Result<TrafficLight, ControlError> {
        // Retire first so a concurrent register of the same id cannot slip
        // in between removal and retirement.
        let newly_retired = self.retired.insert(id.clone());
        let Some((_, machine)) = self.lights.remove(id) else {
            if newly_retired {
                self.retired.remove(id);
            }
            return Err(ControlError::NotFound { id: id.clone() });
        };

        let mut snapshot = machine.snapshot();
        snapshot.updated_at = snapshot.updated_at.max(Utc::now());
        info!(light_id = %id, "Light deregistered");
        self.publish(
            LightEvent::new(LightEventKind::Deregistered, snapshot.clone(), None),
            Origin::Local,
        );
        self.logs.remove(id);
        Ok(snapshot)
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    /// Deliver one tick to every light.
    ///
    /// Only online lights in auto mode change; the others, and lights that
    /// already saw this tick number, are counted as skipped.
    pub fn tick(&self, tick: Tick) -> TickSummary {
        let mut summary = TickSummary {
            tick: tick.number,
            ..TickSummary::default()
        };

        for mut entry in self.lights.iter_mut() {
            let light = entry.value_mut();
            let kind = match light.tick(tick) {
                TickOutcome::Ignored => {
                    summary.skipped = summary.skipped.saturating_add(1);
                    continue;
                }
                TickOutcome::Countdown { .. } => {
                    summary.counted_down = summary.counted_down.saturating_add(1);
                    LightEventKind::Countdown
                }
                TickOutcome::Advanced { from, to } => {
                    summary.advanced = summary.advanced.saturating_add(1);
                    debug!(light_id = %light.id(), tick = tick.number, %from, %to, "Light advanced");
                    LightEventKind::AutoAdvanced
                }
            };
            self.publish(
                LightEvent::new(kind, light.snapshot(), Some(tick.number)),
                Origin::Local,
            );
        }

        summary
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Change a light's control mode.
    pub fn set_mode(&self, id: &LightId, mode: Mode) -> Result<TrafficLight, ControlError> {
        self.mutate(id, LightEventKind::ModeChanged, |light| {
            let previous = light.mode();
            let changed = light.set_mode(mode, Utc::now())?;
            if changed {
                info!(light_id = %id, from = %previous, to = %mode, "Mode changed");
            }
            Ok(changed)
        })
    }

    /// Set a light's color. Only valid in manual mode.
    pub fn set_color(&self, id: &LightId, color: Color) -> Result<TrafficLight, ControlError> {
        self.mutate(id, LightEventKind::ColorSet, |light| {
            let changed = light.set_color(color, Utc::now())?;
            if changed {
                info!(light_id = %id, %color, "Color set");
            }
            Ok(changed)
        })
    }

    /// Change a light's device status. Allowed in every status.
    pub fn set_status(&self, id: &LightId, status: Status) -> Result<TrafficLight, ControlError> {
        self.mutate(id, LightEventKind::StatusChanged, |light| {
            let previous = light.status();
            let changed = light.set_status(status, Utc::now());
            if changed {
                info!(light_id = %id, from = %previous, to = %status, "Status changed");
            }
            Ok(changed)
        })
    }

    /// Run `op` on one light under its entry guard and publish `kind` when
    /// it reports a change. Returns the light's state afterwards.
    fn mutate(
        &self,
        id: &LightId,
        kind: LightEventKind,
        op: impl FnOnce(&mut LightMachine) -> Result<bool, ControlError>,
    ) -> Result<TrafficLight, ControlError> {
        let mut entry = self
            .lights
            .get_mut(id)
            .ok_or_else(|| ControlError::NotFound { id: id.clone() })?;
        let changed = op(entry.value_mut())?;
        let snapshot = entry.value().snapshot();
        if changed {
            self.publish(LightEvent::new(kind, snapshot.clone(), None), Origin::Local);
        }
        Ok(snapshot)
    }

    /// Merge a change written by another client.
    pub fn apply_remote(&self, update: &RemoteUpdate) -> RemoteOutcome {
        let Some(mut entry) = self.lights.get_mut(&update.id) else {
            return RemoteOutcome::UnknownLight;
        };
        let outcome = entry.value_mut().apply_remote(update);
        if outcome == RemoteOutcome::Applied {
            let snapshot = entry.value().snapshot();
            self.publish(
                LightEvent::new(LightEventKind::RemoteMerged, snapshot, None),
                Origin::Remote,
            );
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Read one light.
    pub fn get(&self, id: &LightId) -> Result<TrafficLight, ControlError> {
        self.lights
            .get(id)
            .map(|entry| entry.value().snapshot())
            .ok_or_else(|| ControlError::NotFound { id: id.clone() })
    }

    /// Read every light, sorted by id.
    pub fn list(&self) -> Vec<TrafficLight> {
        let mut lights: Vec<TrafficLight> =
            self.lights.iter().map(|entry| entry.value().snapshot()).collect();
        lights.sort_by(|a, b| a.id.cmp(&b.id));
        lights
    }

    /// Counts by status, mode and color.
    pub fn summary(&self) -> FleetSummary {
        let mut summary = FleetSummary::default();
        for entry in &self.lights {
            summary.record(&entry.value().snapshot());
        }
        summary
    }

    /// Recent events for one light, oldest first.
    ///
    /// Countdown events are not kept.
    pub fn recent_events(&self, id: &LightId) -> Result<Vec<LightEvent>, ControlError> {
        if !self.lights.contains_key(id) {
            return Err(ControlError::NotFound { id: id.clone() });
        }
        Ok(self
            .logs
            .get(id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Event fan-out
    // -----------------------------------------------------------------------

    fn publish(&self, event: LightEvent, origin: Origin) {
        if event.kind != LightEventKind::Countdown && self.log_capacity > 0 {
            let mut log = self.logs.entry(event.light.id.clone()).or_default();
            while log.len() >= self.log_capacity {
                log.pop_front();
            }
            log.push_back(event.clone());
        }

        if origin == Origin::Local {
            let sync = self.sync.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(handle) = sync.as_ref()
                && let Err(e) = handle.submit(&event)
            {
                warn!(light_id = %event.light.id, error = %e, "sync failure, update dropped");
            }
        }

        // A send error only means nobody is subscribed.
        let _ = self.events.send(event);
    }
}
