//! Tick clock for the controller.
//!
//! The clock is the single monotonic source of ticks. Each call to
//! [`TickClock::advance`] produces a [`Tick`] with a strictly greater tick
//! number than the previous one and the wall-clock time it was issued.
//! Light state machines order and deduplicate ticks by number, never by
//! wall time, so a backwards jump of the system clock cannot corrupt a
//! countdown.

use chrono::{DateTime, Utc};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// One discrete unit of controller time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick {
    /// Monotonic tick number, starting at 1 for the first tick.
    pub number: u64,
    /// Wall-clock time the tick was issued.
    pub at: DateTime<Utc>,
}

impl Tick {
    /// Build a tick with an explicit number and timestamp.
    pub const fn new(number: u64, at: DateTime<Utc>) -> Self {
        Self { number, at }
    }
}

/// Monotonic tick provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickClock {
    /// Number of the last issued tick (0 = none issued yet).
    tick: u64,
}

impl TickClock {
    /// Create a clock that has not issued any tick.
    pub const fn new() -> Self {
        Self { tick: 0 }
    }

    /// Restore a clock that already issued `tick` ticks.
    pub const fn from_parts(tick: u64) -> Self {
        Self { tick }
    }

    /// Issue the next tick, stamped with the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<Tick, ClockError> {
        self.advance_at(Utc::now())
    }

    /// Issue the next tick with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance_at(&mut self, at: DateTime<Utc>) -> Result<Tick, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(Tick::new(self.tick, at))
    }

    /// Return the number of the last issued tick.
    pub const fn tick(&self) -> u64 {
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_tick_zero() {
        let clock = TickClock::new();
        assert_eq!(clock.tick(), 0);
    }

    #[test]
    fn ticks_are_strictly_increasing() {
        let mut clock = TickClock::new();
        let first = clock.advance().ok();
        let second = clock.advance().ok();
        assert_eq!(first.map(|t| t.number), Some(1));
        assert_eq!(second.map(|t| t.number), Some(2));
        assert_eq!(clock.tick(), 2);
    }

    #[test]
    fn advance_at_uses_given_timestamp() {
        let mut clock = TickClock::from_parts(41);
        let at = Utc::now();
        let tick = clock.advance_at(at).ok();
        assert_eq!(tick, Some(Tick::new(42, at)));
    }

    #[test]
    fn overflow_is_reported() {
        let mut clock = TickClock::from_parts(u64::MAX);
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
        assert_eq!(clock.tick(), u64::MAX);
    }
}
