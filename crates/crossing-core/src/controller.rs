//! The intersection controller and its toggle task.
//!
//! An [`IntersectionController`] owns the light's current [`Phase`] and the
//! [`PhaseChannel`] its waiters consume from. [`start`] spawns a background
//! thread that flips the phase each time the drawn cycle duration elapses
//! and publishes the new phase. Observers either block in
//! [`wait_for_green`] or take a snapshot with [`current_phase`].
//!
//! # Locking
//!
//! The phase cell and the channel each have their own lock. The toggle task
//! releases the phase lock before publishing, so no code path holds both.
//!
//! # Shutdown
//!
//! [`shutdown`] stops the toggle task within one poll interval, closes the
//! channel so blocked waiters return [`ControllerError::ShutDown`], and joins
//! the thread. Dropping the controller does the same.
//!
//! [`start`]: IntersectionController::start
//! [`wait_for_green`]: IntersectionController::wait_for_green
//! [`current_phase`]: IntersectionController::current_phase
//! [`shutdown`]: IntersectionController::shutdown

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossing_types::Phase;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::channel::{ChannelClosed, PhaseChannel};
use crate::config::{ConfigError, CycleConfig};
use crate::cycle::{CycleTimer, Stopwatch};

/// Name given to the toggle task's thread.
const TOGGLE_THREAD_NAME: &str = "crossing-toggle";

/// Errors surfaced by the controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The cycle configuration failed validation.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The toggle task's thread could not be spawned.
    #[error("failed to spawn toggle task: {source}")]
    Spawn {
        /// The underlying OS error.
        source: std::io::Error,
    },

    /// The controller was shut down while the caller was waiting.
    #[error("controller shut down")]
    ShutDown,
}

impl From<ChannelClosed> for ControllerError {
    fn from(_: ChannelClosed) -> Self {
        Self::ShutDown
    }
}

/// State shared between the controller handle and the toggle task.
#[derive(Debug)]
struct Shared {
    phase: Mutex<Phase>,
    channel: PhaseChannel,
    stop_requested: AtomicBool,
    toggles: AtomicU64,
    cycle: Mutex<Option<Duration>>,
}

impl Shared {
    /// Flip the phase cell and return the new phase. The lock is released
    /// on return.
    fn toggle(&self) -> Phase {
        let mut phase = self.phase.lock();
        *phase = phase.toggled();
        *phase
    }
}

/// A single traffic light alternating between [`Phase::Stop`] and
/// [`Phase::Go`] on a randomized timer.
///
/// Share it between threads with [`Arc`].
#[derive(Debug)]
pub struct IntersectionController {
    shared: Arc<Shared>,
    config: CycleConfig,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IntersectionController {
    /// Create a controller showing [`Phase::Stop`] with the default timing
    /// (a cycle drawn from 4 to 6 seconds).
    pub fn new() -> Self {
        Self::build(CycleConfig::default())
    }

    /// Create a controller showing [`Phase::Stop`] with custom timing.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Config`] if `config` fails validation.
    pub fn with_config(config: &CycleConfig) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self::build(config.clone()))
    }

    fn build(config: CycleConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                phase: Mutex::new(Phase::Stop),
                channel: PhaseChannel::new(),
                stop_requested: AtomicBool::new(false),
                toggles: AtomicU64::new(0),
                cycle: Mutex::new(None),
            }),
            config,
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the toggle task and return immediately.
    ///
    /// Only the first call spawns a task; later calls log a warning and do
    /// nothing, so two tasks never race on the same phase.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Spawn`] if the OS refuses the thread.
    pub fn start(&self) -> Result<(), ControllerError> {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("toggle task already started, ignoring repeated start");
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let timer = CycleTimer::new(&self.config);
        let poll = self.config.poll_interval();

        let handle = thread::Builder::new()
            .name(TOGGLE_THREAD_NAME.to_owned())
            .spawn(move || run_toggle_loop(&shared, timer, poll))
            .map_err(|source| {
                self.started.store(false, Ordering::Release);
                ControllerError::Spawn { source }
            })?;

        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// The phase the light is showing right now.
    ///
    /// Never blocks on the channel. A caller may see a new phase before or
    /// after the matching publish reaches waiters.
    pub fn current_phase(&self) -> Phase {
        *self.shared.phase.lock()
    }

    /// Block until a [`Phase::Go`] is delivered through the channel.
    ///
    /// Every [`Phase::Stop`] received in the meantime is discarded. Each
    /// published Go releases exactly one waiter.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::ShutDown`] once [`shutdown`](Self::shutdown)
    /// has been called and no Go is pending.
    pub fn wait_for_green(&self) -> Result<(), ControllerError> {
        loop {
            if self.shared.channel.receive_unless_closed()?.is_go() {
                return Ok(());
            }
        }
    }

    /// Like [`wait_for_green`](Self::wait_for_green), bounded by `timeout`.
    ///
    /// Returns `Ok(true)` when a Go arrived and `Ok(false)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::ShutDown`] if the controller is shut down
    /// while waiting.
    pub fn wait_for_green_timeout(&self, timeout: Duration) -> Result<bool, ControllerError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let remaining =
                deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
            match self.shared.channel.receive_timeout_unless_closed(remaining)? {
                Some(phase) if phase.is_go() => return Ok(true),
                Some(_) => {}
                None => return Ok(false),
            }
        }
    }

    /// Stop the toggle task, release every waiter and join the thread.
    ///
    /// Safe to call more than once, and before [`start`](Self::start).
    pub fn shutdown(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        self.shared.channel.close();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("toggle task panicked");
            }
            info!(
                toggles = self.toggle_count(),
                final_phase = %self.current_phase(),
                "intersection shut down"
            );
        }
    }

    /// The cycle duration currently used by the toggle task, if started.
    pub fn cycle_duration(&self) -> Option<Duration> {
        *self.shared.cycle.lock()
    }

    /// Number of phase changes performed so far.
    pub fn toggle_count(&self) -> u64 {
        self.shared.toggles.load(Ordering::Acquire)
    }

    #[cfg(test)]
    fn channel(&self) -> &PhaseChannel {
        &self.shared.channel
    }
}

impl Default for IntersectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntersectionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Body of the toggle task: sleep, check the stopwatch, flip and publish.
fn run_toggle_loop(shared: &Shared, mut timer: CycleTimer, poll: Duration) {
    let mut cycle = timer.draw();
    *shared.cycle.lock() = Some(cycle);
    info!(cycle_secs = cycle.as_secs_f64(), "toggle task started");

    let mut stopwatch = Stopwatch::start();
    loop {
        thread::sleep(poll);
        if shared.stop_requested.load(Ordering::Acquire) {
            break;
        }
        if !stopwatch.has_elapsed(cycle) {
            continue;
        }

        let phase = shared.toggle();
        shared.toggles.fetch_add(1, Ordering::AcqRel);
        shared.channel.publish(phase);
        stopwatch.reset();
        debug!(%phase, "phase changed");

        let next = timer.next_after(cycle);
        if next != cycle {
            *shared.cycle.lock() = Some(next);
            debug!(cycle_secs = next.as_secs_f64(), "cycle duration redrawn");
            cycle = next;
        }
    }

    debug!("toggle task stopped");
}
