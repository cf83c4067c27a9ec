//! Per-light state machine.
//!
//! A [`LightMachine`] owns one intersection's `{color, mode, status,
//! remaining_time}` and is the only code that changes them. It is a plain
//! synchronous value; the registry provides mutual exclusion by holding the
//! light's map entry while it calls into the machine.
//!
//! # Auto cycle
//!
//! In [`Mode::Auto`] with [`Status::Online`], every applied tick either
//! decrements `remaining_time` or, once it would reach zero, advances the
//! color along `red -> green -> yellow -> red` and reloads the countdown
//! with the dwell of the newly entered color. At most one color change
//! happens per tick.
//!
//! # Freezing
//!
//! Outside auto mode, or while the light is not online, the countdown is
//! frozen. It is kept (not cleared) so that a light that drops offline
//! resumes where it stopped.

use chrono::{DateTime, Utc};
use signalgrid_types::{
    Color, LightId, LightPatch, Mode, RemoteUpdate, Status, TrafficLight, TrafficLightInit,
};

use crate::clock::Tick;
use crate::config::DwellConfig;
use crate::error::ControlError;

/// What a tick did to one light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick was not applied: the light is frozen, or the tick number
    /// was not newer than the last applied tick.
    Ignored,
    /// The countdown was decremented.
    Countdown {
        /// Countdown after the decrement.
        remaining: u32,
    },
    /// The dwell expired and the color advanced.
    Advanced {
        /// Color before the tick.
        from: Color,
        /// Color after the tick.
        to: Color,
    },
}

/// Result of merging an externally originated change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The change was newer than local state and has been applied.
    Applied,
    /// The change was not newer than local state and was ignored.
    Stale,
    /// The change carried no fields.
    Empty,
    /// No light is registered under the change's id.
    UnknownLight,
}

/// State machine for a single traffic light.
#[derive(Debug, Clone)]
pub struct LightMachine {
    id: LightId,
    name: String,
    location: String,
    mode: Mode,
    status: Status,
    color: Color,
    /// Seconds until the next automatic transition. Frozen outside auto.
    remaining_time: u32,
    /// Number of the last applied tick (0 = none).
    last_tick: u64,
    updated_at: DateTime<Utc>,
    dwell: DwellConfig,
}

impl LightMachine {
    /// Build a machine from registration input.
    ///
    /// The id is generated when absent. The initial state is normalized:
    /// emergency forces red, and an auto light without a positive countdown
    /// is seeded from the dwell table.
    pub fn new(
        init: TrafficLightInit,
        dwell: DwellConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, ControlError> {
        if init.name.trim().is_empty() {
            return Err(ControlError::InvalidInit {
                reason: "name must not be empty".to_owned(),
            });
        }

        let mut machine = Self {
            id: init.id.unwrap_or_else(LightId::generate),
            name: init.name,
            location: init.location,
            mode: init.mode,
            status: init.status,
            color: init.color,
            remaining_time: init.remaining_time.unwrap_or(0),
            last_tick: 0,
            updated_at: now,
            dwell,
        };
        machine.normalize();
        Ok(machine)
    }

    /// Rebuild a machine from a persisted snapshot, keeping its timestamp.
    pub fn from_snapshot(light: TrafficLight, dwell: DwellConfig) -> Self {
        let mut machine = Self {
            id: light.id,
            name: light.name,
            location: light.location,
            mode: light.mode,
            status: light.status,
            color: light.color,
            remaining_time: light.remaining_time.unwrap_or(0),
            last_tick: 0,
            updated_at: light.updated_at,
            dwell,
        };
        machine.normalize();
        machine
    }

    /// The light's identifier.
    pub const fn id(&self) -> &LightId {
        &self.id
    }

    /// Current control mode.
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Current device status.
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Currently displayed color.
    pub const fn color(&self) -> Color {
        self.color
    }

    /// Countdown value, including a frozen one outside auto mode.
    pub const fn remaining_time(&self) -> u32 {
        self.remaining_time
    }

    /// Number of the last applied tick (0 = none).
    pub const fn last_tick(&self) -> u64 {
        self.last_tick
    }

    /// Whether a tick would be applied to this light.
    pub fn is_ticking(&self) -> bool {
        self.mode == Mode::Auto && self.status == Status::Online
    }

    /// Read-only copy of the light's state.
    pub fn snapshot(&self) -> TrafficLight {
        TrafficLight {
            id: self.id.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
            mode: self.mode,
            status: self.status,
            color: self.color,
            remaining_time: (self.mode == Mode::Auto).then_some(self.remaining_time),
            updated_at: self.updated_at,
        }
    }

    /// Apply one tick.
    pub fn tick(&mut self, tick: Tick) -> TickOutcome {
        if !self.is_ticking() || tick.number <= self.last_tick {
            return TickOutcome::Ignored;
        }
        self.last_tick = tick.number;
        self.touch(tick.at);

        if self.remaining_time > 1 {
            self.remaining_time = self.remaining_time.saturating_sub(1);
            return TickOutcome::Countdown {
                remaining: self.remaining_time,
            };
        }

        let from = self.color;
        self.color = from.next();
        self.remaining_time = self.dwell.seconds(self.color);
        TickOutcome::Advanced {
            from,
            to: self.color,
        }
    }

    /// Change the control mode.
    ///
    /// Returns `Ok(false)` when the light is already in `mode`.
    pub fn set_mode(&mut self, mode: Mode, now: DateTime<Utc>) -> Result<bool, ControlError> {
        self.require_online()?;
        if mode == self.mode {
            return Ok(false);
        }

        match (self.mode, mode) {
            (_, Mode::Emergency) => self.color = Color::Red,
            (Mode::Emergency, Mode::Auto) => {
                self.color = Color::Red;
                self.remaining_time = self.dwell.seconds(Color::Red);
            }
            (_, Mode::Auto) => self.remaining_time = self.dwell.seconds(self.color),
            (_, Mode::Manual) => {}
        }
        self.mode = mode;
        self.touch(now);
        Ok(true)
    }

    /// Set the displayed color. Only valid in manual mode.
    ///
    /// Returns `Ok(false)` when the light already shows `color`.
    pub fn set_color(&mut self, color: Color, now: DateTime<Utc>) -> Result<bool, ControlError> {
        self.require_online()?;
        if self.mode != Mode::Manual {
            return Err(ControlError::InvalidModeForOperation {
                id: self.id.clone(),
                mode: self.mode,
                operation: "set_color",
            });
        }
        if color == self.color {
            return Ok(false);
        }
        self.color = color;
        self.touch(now);
        Ok(true)
    }

    /// Change the device status. Allowed in every status.
    ///
    /// Returns `false` when the light already has `status`.
    pub fn set_status(&mut self, status: Status, now: DateTime<Utc>) -> bool {
        if status == self.status {
            return false;
        }
        self.status = status;
        self.normalize();
        self.touch(now);
        true
    }

    /// Merge a remote change with last-writer-wins on `updated_at`.
    ///
    /// The change is applied only when strictly newer than local state. It
    /// bypasses the online gate, since it records what another client
    /// already did, and the result is normalized like an initial state.
    pub fn apply_remote(&mut self, update: &RemoteUpdate) -> RemoteOutcome {
        if update.updated_at <= self.updated_at {
            return RemoteOutcome::Stale;
        }
        if update.patch.is_empty() {
            return RemoteOutcome::Empty;
        }

        let LightPatch {
            mode,
            status,
            color,
            remaining_time,
        } = update.patch;
        let was_auto = self.mode == Mode::Auto;
        let previous_color = self.color;

        if let Some(mode) = mode {
            self.mode = mode;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(color) = color {
            self.color = color;
        }
        // An auto light whose phase changed restarts that phase's countdown.
        let reseed = self.mode == Mode::Auto && (!was_auto || self.color != previous_color);
        match remaining_time {
            Some(seconds) => self.remaining_time = seconds,
            None if reseed => self.remaining_time = self.dwell.seconds(self.color),
            None => {}
        }
        self.normalize();
        self.updated_at = update.updated_at;
        RemoteOutcome::Applied
    }

    fn require_online(&self) -> Result<(), ControlError> {
        if self.status == Status::Online {
            Ok(())
        } else {
            Err(ControlError::NotOnline {
                id: self.id.clone(),
                status: self.status,
            })
        }
    }

    fn normalize(&mut self) {
        if self.mode == Mode::Emergency {
            self.color = Color::Red;
        }
        if self.mode == Mode::Auto && self.remaining_time == 0 {
            self.remaining_time = self.dwell.seconds(self.color);
        }
    }

    /// Stamp a state change. Never moves `updated_at` backwards, so a tick
    /// issued before a concurrent command cannot undo its LWW ordering.
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(at);
    }
}
