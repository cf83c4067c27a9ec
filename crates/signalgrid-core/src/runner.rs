//! Controller loop runner with operator controls.
//!
//! This module provides [`run_controller`], the top-level async function
//! that drives the global tick with support for:
//!
//! - **Bounded runs**: stop after `max_ticks` or `max_real_time_seconds`
//! - **Pause/resume**: operator can halt and continue ticking
//! - **Variable tick speed**: tick interval adjustable at runtime
//! - **Operator stop**: clean stop via REST API
//!
//! Each iteration issues one [`Tick`](crate::clock::Tick) from the
//! [`TickClock`] and fans it out through [`LightRegistry::tick`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::{ClockError, TickClock};
use crate::operator::{OperatorState, RunEndReason};
use crate::registry::{LightRegistry, TickSummary};

/// Errors that can occur during the controller run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The tick clock failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// Result of the controller run.
#[derive(Debug)]
pub struct RunResult {
    /// The reason the loop ended.
    pub end_reason: RunEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks delivered by this run.
    pub total_ticks: u64,
}

/// Callback invoked after each tick completes.
pub trait TickCallback: Send {
    /// Called after a tick has been delivered to every light.
    fn on_tick(&mut self, summary: &TickSummary, registry: &LightRegistry);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _registry: &LightRegistry) {}
}

/// Run the tick loop until a termination condition is met.
///
/// Commands are served concurrently by other tasks through the shared
/// registry; this loop only delivers ticks.
pub async fn run_controller(
    registry: &LightRegistry,
    clock: &mut TickClock,
    operator: &Arc<OperatorState>,
    callback: &mut dyn TickCallback,
) -> Result<RunResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        lights = registry.len(),
        max_ticks = operator.max_ticks(),
        max_real_time_seconds = operator.max_real_time_seconds(),
        tick_interval_ms = operator.tick_interval_ms(),
        "Controller starting"
    );

    loop {
        // --- Check pause ---
        if operator.is_paused() {
            info!("Ticking paused, waiting for resume...");
            operator.wait_if_paused().await;
            info!("Ticking resumed");
        }

        // --- Check stop request (before tick) ---
        if operator.is_stop_requested() {
            info!("Operator stop requested");
            return finish(operator, RunEndReason::OperatorStop, last_summary, total_ticks).await;
        }

        // --- Check time limit (before tick) ---
        if operator.time_limit_reached() {
            info!(
                max_seconds = operator.max_real_time_seconds(),
                elapsed = operator.elapsed_seconds(),
                "Real-time limit reached"
            );
            return finish(operator, RunEndReason::MaxRealTimeReached, last_summary, total_ticks)
                .await;
        }

        // --- Deliver tick ---
        let tick = clock.advance()?;
        let summary = registry.tick(tick);
        operator.record_tick(tick.number);
        total_ticks = total_ticks.saturating_add(1);
        debug!(
            tick = summary.tick,
            counted_down = summary.counted_down,
            advanced = summary.advanced,
            skipped = summary.skipped,
            "Tick delivered"
        );

        // --- Notify callback ---
        callback.on_tick(&summary, registry);

        // --- Check tick limit (after tick) ---
        if operator.tick_limit_reached(summary.tick) {
            info!(
                tick = summary.tick,
                max_ticks = operator.max_ticks(),
                "Tick limit reached"
            );
            return finish(operator, RunEndReason::MaxTicksReached, Some(summary), total_ticks)
                .await;
        }

        last_summary = Some(summary);

        // --- Sleep for tick interval ---
        let interval_ms = operator.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        }
    }
}

async fn finish(
    operator: &OperatorState,
    reason: RunEndReason,
    final_summary: Option<TickSummary>,
    total_ticks: u64,
) -> Result<RunResult, RunnerError> {
    operator.set_end_reason(reason).await;
    Ok(RunResult {
        end_reason: reason,
        final_summary,
        total_ticks,
    })
}

/// Log the end of a controller run.
pub fn log_run_end(result: &RunResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Controller stopped"
    );
    if result.final_summary.is_none() {
        warn!("Controller stopped with no ticks delivered");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use signalgrid_types::{Color, LightId, TrafficLightInit};

    use super::*;
    use crate::config::{ControllerConfig, RunBoundsConfig};

    fn registry_with_light() -> (LightRegistry, LightId) {
        let registry = LightRegistry::new(&ControllerConfig::default());
        let id = registry
            .register(TrafficLightInit::new("Main & 5th", "Downtown"))
            .unwrap();
        (registry, id)
    }

    fn bounds(max_ticks: u64) -> RunBoundsConfig {
        RunBoundsConfig {
            max_ticks,
            max_real_time_seconds: 0,
        }
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let (registry, id) = registry_with_light();
        let operator = Arc::new(OperatorState::new(0, &bounds(30)));
        let mut clock = TickClock::new();

        let result = run_controller(&registry, &mut clock, &operator, &mut NoOpCallback)
            .await
            .unwrap();

        assert_eq!(result.end_reason, RunEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 30);
        assert_eq!(result.final_summary.map(|s| s.advanced), Some(1));
        assert_eq!(operator.current_tick(), 30);
        assert_eq!(operator.end_reason().await, Some(RunEndReason::MaxTicksReached));

        let light = registry.get(&id).unwrap();
        assert_eq!(light.color, Color::Green);
        assert_eq!(light.remaining_time, Some(25));
    }

    #[tokio::test]
    async fn operator_stop() {
        let (registry, _) = registry_with_light();
        let operator = Arc::new(OperatorState::new(0, &bounds(0)));
        operator.request_stop();
        let mut clock = TickClock::new();

        let result = run_controller(&registry, &mut clock, &operator, &mut NoOpCallback)
            .await
            .unwrap();

        assert_eq!(result.end_reason, RunEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
    }

    #[tokio::test]
    async fn tick_callback_is_called() {
        struct CountCallback {
            count: u64,
        }
        impl TickCallback for CountCallback {
            fn on_tick(&mut self, _summary: &TickSummary, _registry: &LightRegistry) {
                self.count = self.count.saturating_add(1);
            }
        }

        let (registry, _) = registry_with_light();
        let operator = Arc::new(OperatorState::new(0, &bounds(3)));
        let mut clock = TickClock::new();
        let mut cb = CountCallback { count: 0 };

        let _ = run_controller(&registry, &mut clock, &operator, &mut cb)
            .await
            .unwrap();

        assert_eq!(cb.count, 3);
    }

    #[tokio::test]
    async fn resumed_clock_continues_numbering() {
        let (registry, _) = registry_with_light();
        let operator = Arc::new(OperatorState::new(0, &bounds(12)));
        let mut clock = TickClock::from_parts(10);

        let result = run_controller(&registry, &mut clock, &operator, &mut NoOpCallback)
            .await
            .unwrap();

        assert_eq!(result.total_ticks, 2);
        assert_eq!(clock.tick(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_paused_ends_run() {
        let (registry, id) = registry_with_light();
        let operator = Arc::new(OperatorState::new(1000, &bounds(0)));
        operator.pause();

        let stopper = {
            let operator = Arc::clone(&operator);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                operator.request_stop();
            })
        };

        let mut clock = TickClock::new();
        let result = run_controller(&registry, &mut clock, &operator, &mut NoOpCallback)
            .await
            .unwrap();
        stopper.await.unwrap();

        assert_eq!(result.end_reason, RunEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 0);
        assert_eq!(registry.get(&id).unwrap().remaining_time, Some(30));
    }
}
