//! Observer tasks: simulated vehicles queued at the light.
//!
//! Each observer runs on tokio's blocking pool because
//! [`IntersectionController::wait_for_green`] parks its thread. An observer
//! loops until the controller shuts down, logging every passage.

use std::sync::Arc;

use crossing_core::controller::{ControllerError, IntersectionController};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::EngineError;

/// What one observer did before the controller shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverReport {
    /// Observer number, starting at 1.
    pub id: u32,
    /// How many times the observer saw the light turn green.
    pub passages: u64,
}

/// Spawn `count` observers sharing `controller`.
pub fn spawn_observers(
    controller: &Arc<IntersectionController>,
    count: u32,
) -> Vec<JoinHandle<ObserverReport>> {
    (1..=count)
        .map(|id| {
            let controller = Arc::clone(controller);
            tokio::task::spawn_blocking(move || run_observer(id, &controller))
        })
        .collect()
}

/// Wait for every observer to finish and collect their reports.
///
/// # Errors
///
/// Returns [`EngineError::Observer`] if an observer task panicked or was
/// cancelled.
pub async fn join_observers(
    handles: Vec<JoinHandle<ObserverReport>>,
) -> Result<Vec<ObserverReport>, EngineError> {
    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let report = handle.await.map_err(|e| EngineError::Observer {
            message: format!("{e}"),
        })?;
        reports.push(report);
    }
    Ok(reports)
}

fn run_observer(id: u32, controller: &IntersectionController) -> ObserverReport {
    let mut passages: u64 = 0;
    loop {
        match controller.wait_for_green() {
            Ok(()) => {
                passages = passages.saturating_add(1);
                info!(
                    observer = id,
                    passages,
                    phase = %controller.current_phase(),
                    "observer {id} proceeds"
                );
            }
            Err(ControllerError::ShutDown) => break,
            Err(e) => {
                warn!(observer = id, error = %e, "observer stopped");
                break;
            }
        }
    }
    ObserverReport { id, passages }
}
