//! Background driver for a scene.
//!
//! The [`Manager`] runs [`Scene::tick`] in a loop on a dedicated thread.
//! Control state is shared with the loop through atomics so status reads
//! never wait on a tick.
//!
//! # Loop
//!
//! Each iteration runs [`TickHooks::before_update`], one tick,
//! [`TickHooks::after_update`], then the throttle. With a rate cap of
//! `max_ups` the throttle sleeps for whatever is left of `1 / max_ups`
//! seconds; a cap of 0 never sleeps. Stopping is cooperative: the flag is
//! checked once per iteration, a running tick always completes and a
//! throttle sleep is cut short.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::DataPoints;
use crate::scene::{Scene, TickSummary};
use crate::throughput::{DEFAULT_WINDOW, ThroughputWindow};

/// Errors reported by the manager.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The loop thread could not be spawned.
    #[error("failed to spawn simulation thread: {source}")]
    Spawn {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The loop thread ended because a behavior or hook panicked.
    #[error("simulation loop terminated by a panic")]
    LoopPanicked,
}

/// Extension points run on the loop thread around every tick.
pub trait TickHooks: Send {
    /// Called right before [`Scene::tick`].
    fn before_update(&mut self, _scene: &Scene) {}

    /// Called right after [`Scene::tick`] with its summary.
    fn after_update(&mut self, _scene: &Scene, _summary: &TickSummary) {}
}

/// Hooks that do nothing.
pub struct NoOpHooks;

impl TickHooks for NoOpHooks {}

/// Point-in-time view of a manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerStatus {
    /// Whether the loop is running.
    pub running: bool,
    /// Age of the scene.
    pub age: u64,
    /// Entities in the scene.
    pub population: usize,
    /// Mean achieved updates per second over the recent window.
    pub ups: f64,
    /// Configured rate cap (0 = unlimited).
    pub max_ups: u32,
    /// Wall-clock time of the most recent start.
    pub started_at: Option<DateTime<Utc>>,
}

/// State shared between the manager and its loop thread.
struct Shared {
    running: AtomicBool,
    max_ups: AtomicU32,
    throughput: Mutex<ThroughputWindow>,
    started_at: Mutex<Option<DateTime<Utc>>>,
    sleep_lock: Mutex<()>,
    wake: Condvar,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Sleep for the rest of the iteration budget unless stopped.
    fn throttle(&self, elapsed: Duration) {
        let max_ups = self.max_ups.load(Ordering::Acquire);
        let Some(budget) = Duration::from_secs(1).checked_div(max_ups) else {
            return;
        };
        let remaining = budget.saturating_sub(elapsed);
        if remaining.is_zero() {
            return;
        }
        let mut guard = self.sleep_lock.lock();
        self.wake
            .wait_while_for(&mut guard, |_| self.is_running(), remaining);
    }

    /// Clear the running flag and cut any throttle sleep short.
    fn signal_stop(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        let _guard = self.sleep_lock.lock();
        self.wake.notify_all();
        was_running
    }
}

/// Clears the running flag when the loop exits, including by panic.
struct RunningGuard(Arc<Shared>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
        if thread::panicking() {
            warn!("Simulation loop terminated by a panic");
        }
    }
}

type SharedHooks = Arc<Mutex<Box<dyn TickHooks>>>;

/// Drives a [`Scene`] on a background thread.
pub struct Manager {
    scene: Arc<Scene>,
    shared: Arc<Shared>,
    hooks: SharedHooks,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Manager {
    /// Create a stopped manager with no hooks.
    pub fn new(scene: Arc<Scene>) -> Self {
        Self::with_hooks(scene, NoOpHooks)
    }

    /// Create a stopped manager with the given hooks.
    pub fn with_hooks<H: TickHooks + 'static>(scene: Arc<Scene>, hooks: H) -> Self {
        Self {
            scene,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                max_ups: AtomicU32::new(0),
                throughput: Mutex::new(ThroughputWindow::new(DEFAULT_WINDOW)),
                started_at: Mutex::new(None),
                sleep_lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
            hooks: Arc::new(Mutex::new(Box::new(hooks))),
            handle: Mutex::new(None),
        }
    }

    /// Keep `samples` iterations in the UPS window.
    #[must_use]
    pub fn with_ups_window(self, samples: usize) -> Self {
        *self.shared.throughput.lock() = ThroughputWindow::new(samples);
        self
    }

    /// Replace the hooks. Takes effect from the next hook call.
    pub fn set_hooks<H: TickHooks + 'static>(&self, hooks: H) {
        *self.hooks.lock() = Box::new(hooks);
    }

    /// The managed scene.
    pub const fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    /// Return `true` while the loop is running.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Mean achieved updates per second over the recent window.
    pub fn ups(&self) -> f64 {
        self.shared.throughput.lock().mean()
    }

    /// The current rate cap (0 = unlimited).
    pub fn max_ups(&self) -> u32 {
        self.shared.max_ups.load(Ordering::Acquire)
    }

    /// Change the rate cap of a running loop.
    pub fn set_max_ups(&self, max_ups: u32) {
        self.shared.max_ups.store(max_ups, Ordering::Release);
    }

    /// Point-in-time status.
    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            running: self.is_running(),
            age: self.scene.age(),
            population: self.scene.population(),
            ups: self.ups(),
            max_ups: self.max_ups(),
            started_at: *self.shared.started_at.lock(),
        }
    }

    /// Start ticking with a rate cap of `max_ups` (0 = unlimited).
    ///
    /// Does nothing if the loop is already running. A loop thread left
    /// over from an earlier run is joined first. When called from the loop
    /// thread itself (from a hook, after [`stop_simulation`]) the current
    /// loop keeps going instead of a new thread being spawned.
    ///
    /// [`stop_simulation`]: Self::stop_simulation
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Spawn`] if the thread cannot be created.
    pub fn start_simulation(&self, max_ups: u32) -> Result<(), ManagerError> {
        let mut handle = self.handle.lock();
        if self.shared.is_running() {
            return Ok(());
        }

        if is_current_thread(handle.as_ref()) {
            self.arm(max_ups);
            info!(max_ups, age = self.scene.age(), "Simulation resumed from its loop thread");
            return Ok(());
        }

        if let Some(previous) = handle.take() {
            if previous.join().is_err() {
                warn!("Previous simulation loop had panicked");
            }
        }

        self.arm(max_ups);

        let scene = Arc::clone(&self.scene);
        let shared = Arc::clone(&self.shared);
        let hooks = Arc::clone(&self.hooks);
        let spawned = thread::Builder::new()
            .name(String::from("flatworld-loop"))
            .spawn(move || run_loop(&scene, shared, &hooks));

        match spawned {
            Ok(join) => {
                *handle = Some(join);
                info!(max_ups, age = self.scene.age(), "Simulation started");
                Ok(())
            }
            Err(source) => {
                self.shared.running.store(false, Ordering::Release);
                Err(ManagerError::Spawn { source })
            }
        }
    }

    /// Stop ticking and wait for the loop thread to finish.
    ///
    /// Does nothing if the loop is not running. When called from the loop
    /// thread itself (from a hook) the flag is set but the thread is not
    /// joined; the loop exits after the current iteration.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::LoopPanicked`] if the loop thread had
    /// terminated by a panic.
    pub fn stop_simulation(&self) -> Result<(), ManagerError> {
        let was_running = self.shared.signal_stop();

        let join = {
            let mut handle = self.handle.lock();
            if is_current_thread(handle.as_ref()) {
                return Ok(());
            }
            handle.take()
        };
        let Some(join) = join else {
            return Ok(());
        };

        let joined = join.join();
        info!(age = self.scene.age(), was_running, "Simulation stopped");
        match joined {
            Ok(()) => Ok(()),
            Err(_panic) => Err(ManagerError::LoopPanicked),
        }
    }

    /// Reset the per-run state and raise the running flag.
    fn arm(&self, max_ups: u32) {
        self.shared.max_ups.store(max_ups, Ordering::Release);
        self.shared.throughput.lock().clear();
        *self.shared.started_at.lock() = Some(Utc::now());
        self.shared.running.store(true, Ordering::Release);
    }
}

impl DataPoints for Manager {
    fn data_points(&self) -> Vec<(&'static str, f64)> {
        let mut points = self.scene.data_points();
        points.push(("ups", self.ups()));
        points
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if let Err(e) = self.stop_simulation() {
            warn!(error = %e, "Simulation loop ended abnormally");
        }
    }
}

impl core::fmt::Debug for Manager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Manager")
            .field("scene", &self.scene)
            .field("running", &self.is_running())
            .field("max_ups", &self.max_ups())
            .finish_non_exhaustive()
    }
}

fn is_current_thread(handle: Option<&JoinHandle<()>>) -> bool {
    handle.is_some_and(|h| h.thread().id() == thread::current().id())
}

fn run_loop(scene: &Scene, shared: Arc<Shared>, hooks: &SharedHooks) {
    let guard = RunningGuard(shared);
    let shared = &guard.0;

    while shared.is_running() {
        let iteration = Instant::now();

        hooks.lock().before_update(scene);
        let summary = scene.tick();
        hooks.lock().after_update(scene, &summary);

        shared.throttle(iteration.elapsed());
        // A sleep cut short by stop is not a real sample.
        if shared.is_running() {
            shared.throughput.lock().record(iteration.elapsed());
        }
    }
}
