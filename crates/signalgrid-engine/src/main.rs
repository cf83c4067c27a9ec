//! Controller binary for `SignalGrid`.
//!
//! This is the main entry point that wires together the light registry,
//! the store sync worker, the remote change feed, the Observer API and
//! the tick loop. It loads configuration, initializes all subsystems, and
//! runs the controller until a termination condition is met.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `signalgrid-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Open the store (Dragonfly or in-memory)
//! 4. Start the sync worker and create the registry
//! 5. Restore lights from the store, or register the seed fleet
//! 6. Start the remote change feed
//! 7. Create operator state from run bounds
//! 8. Start the Observer API server
//! 9. Install the Ctrl-C stop handler
//! 10. Run the tick loop
//! 11. Stop the Observer API, drain the sync queue, save the final fleet

mod bootstrap;
mod error;
mod summary_callback;

use std::path::Path;
use std::sync::Arc;

use signalgrid_core::clock::TickClock;
use signalgrid_core::command::CommandInterface;
use signalgrid_core::config::{LoggingConfig, SignalGridConfig};
use signalgrid_core::operator::OperatorState;
use signalgrid_core::registry::LightRegistry;
use signalgrid_core::runner;
use signalgrid_core::sync;
use signalgrid_observer::{AppState, ObserverServer, ServerConfig};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::summary_callback::{DEFAULT_SUMMARY_EVERY, SummaryCallback};

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "signalgrid-config.yaml";

/// Application entry point for the controller.
///
/// Initializes all subsystems and runs the tick loop. Returns an error
/// on failure.
///
/// # Errors
///
/// Returns an error if any initialization step or the tick loop fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("signalgrid-engine starting");
    info!(
        tick_interval_ms = config.controller.tick_interval_ms,
        red = config.controller.dwell.red,
        green = config.controller.dwell.green,
        yellow = config.controller.dwell.yellow,
        seed_lights = config.lights.len(),
        persistence_enabled = config.infrastructure.persistence_enabled,
        "Configuration loaded"
    );

    // 3. Open the store.
    let store = bootstrap::open_store(&config.infrastructure).await;

    // 4. Start the sync worker and create the registry.
    let (sync_handle, sync_worker) =
        sync::spawn_sync_worker(store.clone(), config.controller.sync_queue_capacity);
    let registry =
        Arc::new(LightRegistry::new(&config.controller).with_sync(sync_handle));

    // 5. Fill the registry.
    let source = bootstrap::load_fleet(&registry, &store, &config.lights).await?;
    info!(
        ?source,
        loaded = source.loaded(),
        skipped = source.skipped(),
        lights = registry.len(),
        "Registry ready"
    );

    // 6. Start the remote change feed.
    match store
        .subscribe_changes(config.controller.event_channel_capacity)
        .await
    {
        Ok(changes) => {
            tokio::spawn(sync::run_remote_feed(Arc::clone(&registry), changes));
            info!(backend = store.name(), "Remote change feed started");
        }
        Err(e) => {
            warn!(error = %e, "Remote change feed unavailable, continuing without it");
        }
    }

    // 7. Create operator state.
    let operator = Arc::new(OperatorState::new(
        config.controller.tick_interval_ms,
        &config.run,
    ));

    // 8. Start Observer API server.
    let server_config = ServerConfig {
        host: config.infrastructure.observer_host.clone(),
        port: config.infrastructure.observer_port,
    };
    let server = ObserverServer::bind(&server_config).await?;
    let addr = server.local_addr();
    let app_state = Arc::new(AppState::with_operator(
        CommandInterface::new(Arc::clone(&registry)),
        Arc::clone(&operator),
    ));
    let (stop_server, server_stopped) = oneshot::channel::<()>();
    let server_task = tokio::spawn(async move {
        let shutdown = async {
            let _ = server_stopped.await;
        };
        if let Err(e) = server.serve(app_state, shutdown).await {
            error!(error = %e, "Observer API server stopped");
        }
    });
    info!(%addr, "Observer API server started");

    // 9. Stop cleanly on Ctrl-C so the final fleet is saved.
    {
        let operator = Arc::clone(&operator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping controller");
                operator.request_stop();
            }
        });
    }

    // 10. Run the tick loop.
    let mut clock = TickClock::new();
    let mut callback = SummaryCallback::new(DEFAULT_SUMMARY_EVERY);
    let result = runner::run_controller(&registry, &mut clock, &operator, &mut callback).await?;

    // 11. Stop accepting commands, flush queued writes, then save.
    let _ = stop_server.send(());
    if let Err(e) = server_task.await {
        warn!(error = %e, "Observer API server task did not finish cleanly");
    }
    let sync_stats = bootstrap::drain_sync(&registry, sync_worker).await;
    let failed = bootstrap::save_fleet(&registry, &store).await;
    if failed > 0 {
        warn!(failed, "Some lights were not saved on shutdown");
    }
    runner::log_run_end(&result);

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        fleet_reports = callback.reports(),
        synced = sync_stats.map_or(0, |stats| stats.saved),
        "signalgrid-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from [`CONFIG_PATH`], or defaults if it is absent.
fn load_config() -> Result<SignalGridConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(SignalGridConfig::from_file(config_path)?)
    } else {
        Ok(SignalGridConfig::parse("")?)
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
