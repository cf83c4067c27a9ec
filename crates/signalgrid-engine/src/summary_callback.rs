//! Tick callback that reports fleet progress to the log.
//!
//! The observer reads the registry directly and receives events over the
//! broadcast channel, so the tick loop only needs to report. Every tick
//! that advanced a color is logged at `debug`; every `every` ticks a
//! fleet summary is logged at `info`.

use signalgrid_core::registry::{LightRegistry, TickSummary};
use signalgrid_core::runner::TickCallback;
use tracing::{debug, info};

/// Ticks between fleet summaries at 1 Hz: once a minute.
pub const DEFAULT_SUMMARY_EVERY: u64 = 60;

/// Callback that logs tick and fleet summaries.
#[derive(Debug)]
pub struct SummaryCallback {
    every: u64,
    reports: u64,
}

impl SummaryCallback {
    /// Log a fleet summary every `every` ticks (0 disables it).
    pub const fn new(every: u64) -> Self {
        Self { every, reports: 0 }
    }

    /// Number of fleet summaries logged so far.
    pub const fn reports(&self) -> u64 {
        self.reports
    }
}

impl TickCallback for SummaryCallback {
    fn on_tick(&mut self, summary: &TickSummary, registry: &LightRegistry) {
        if summary.advanced > 0 {
            debug!(
                tick = summary.tick,
                advanced = summary.advanced,
                "Colors advanced"
            );
        }

        if self.every == 0 || summary.tick.checked_rem(self.every) != Some(0) {
            return;
        }

        let fleet = registry.summary();
        info!(
            tick = summary.tick,
            total = fleet.total,
            online = fleet.online,
            offline = fleet.offline,
            maintenance = fleet.maintenance,
            auto = fleet.auto,
            manual = fleet.manual,
            emergency = fleet.emergency,
            red = fleet.red,
            yellow = fleet.yellow,
            green = fleet.green,
            "Fleet summary"
        );
        self.reports = self.reports.saturating_add(1);
    }
}
