//! Engine binary for the Crossing simulation.
//!
//! Wires one [`IntersectionController`] to a set of observer tasks and runs
//! until Ctrl-C or until the configured wall-clock budget is spent.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `crossing-config.yaml`
//! 3. Create the controller and start its toggle task
//! 4. Spawn observers
//! 5. Wait for Ctrl-C or the time limit
//! 6. Shut the controller down and collect observer reports

mod error;
mod observer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossing_core::config::CrossingConfig;
use crossing_core::controller::IntersectionController;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Environment variable naming an alternative config file.
const CONFIG_PATH_ENV_VAR: &str = "CROSSING_CONFIG";

/// Config file used when `CROSSING_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "crossing-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, the controller, or an observer fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("crossing-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        min_cycle_secs = config.cycle.min_cycle_secs,
        max_cycle_secs = config.cycle.max_cycle_secs,
        poll_interval_ms = config.cycle.poll_interval_ms,
        reroll_each_cycle = config.cycle.reroll_each_cycle,
        observers = config.engine.observers,
        max_real_time_seconds = config.engine.max_real_time_seconds,
        "Configuration loaded"
    );

    // 3. Create the controller and start the light.
    let controller = Arc::new(
        IntersectionController::with_config(&config.cycle).map_err(EngineError::from)?,
    );
    controller.start().map_err(EngineError::from)?;
    info!(phase = %controller.current_phase(), "Intersection started");

    // 4. Spawn observers.
    let handles = observer::spawn_observers(&controller, config.engine.observers);

    // 5. Run until interrupted or out of time.
    wait_for_termination(config.engine.max_real_time_seconds).await;

    // 6. Shut down and report.
    let shutdown = Arc::clone(&controller);
    tokio::task::spawn_blocking(move || shutdown.shutdown())
        .await
        .map_err(|e| EngineError::Shutdown {
            message: format!("{e}"),
        })?;

    let reports = observer::join_observers(handles).await?;
    for report in &reports {
        info!(observer = report.id, passages = report.passages, "Observer finished");
    }

    info!(
        toggles = controller.toggle_count(),
        observers = reports.len(),
        "crossing-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `CROSSING_CONFIG` or `crossing-config.yaml`.
///
/// Falls back to defaults (with environment overrides) when the file does
/// not exist.
fn load_config() -> Result<CrossingConfig, EngineError> {
    let config_path = std::env::var(CONFIG_PATH_ENV_VAR)
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        let config = CrossingConfig::from_file(&config_path)?;
        info!(path = %config_path.display(), "Config file loaded");
        Ok(config)
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        Ok(CrossingConfig::parse("")?)
    }
}

/// Resolve when Ctrl-C arrives or, if `max_real_time_seconds` is non-zero,
/// when that many seconds have passed.
async fn wait_for_termination(max_real_time_seconds: u64) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    if max_real_time_seconds == 0 {
        ctrl_c.await;
        info!("Ctrl-C received");
        return;
    }

    tokio::select! {
        () = ctrl_c => info!("Ctrl-C received"),
        () = tokio::time::sleep(Duration::from_secs(max_real_time_seconds)) => {
            info!(max_real_time_seconds, "Real-time limit reached");
        }
    }
}
