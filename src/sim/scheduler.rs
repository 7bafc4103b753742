//! Cancellable control loop driving the set-point controller against a store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::clock::{Clock, SystemClock};
use super::controller::SetPointController;
use super::types::{LoopState, LoopStats, TickReport};
use crate::config::SimulationSettings;
use crate::error::{SimError, StoreError};
use crate::store::TimeSeriesStore;
use crate::topology::Topology;

/// Owns the loop settings and the shared store, and starts loop runs.
///
/// One run at a time: [`start`](Self::start) fails with
/// [`SimError::AlreadyRunning`] while a previous run is `Running`, and
/// starting again after it reached `Stopped` or `Failed` begins a new run
/// against the same store.
pub struct Scheduler<S> {
    store: Arc<S>,
    settings: SimulationSettings,
    clock: Arc<dyn Clock>,
    state: Arc<watch::Sender<LoopState>>,
    starting: Mutex<()>,
}

impl<S: TimeSeriesStore + 'static> Scheduler<S> {
    /// Creates an idle scheduler reading timestamps from the system clock.
    ///
    /// # Arguments
    ///
    /// * `store` - Store shared with read-only observers
    /// * `settings` - Loop parameters, copied into every run
    pub fn new(store: Arc<S>, settings: SimulationSettings) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            store,
            settings,
            clock: Arc::new(SystemClock::new()),
            state: Arc::new(state),
            starting: Mutex::new(()),
        }
    }

    /// Replaces the timestamp source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// State of the most recent run, `Idle` before the first one.
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Seeds one reading per point, then spawns the loop task.
    ///
    /// The returned handle's [`cancel`](LoopHandle::cancel) stops the run.
    ///
    /// # Errors
    ///
    /// - [`SimError::AlreadyRunning`] if a run is in progress
    /// - [`SimError::Config`] with the first violation if the settings are invalid
    /// - [`SimError::Topology`] if the topology fails validation
    /// - [`SimError::Store`] / [`SimError::StoreTimeout`] if the seed batch is rejected
    ///
    /// No task is spawned on error and the state is left unchanged.
    pub async fn start(&self, topology: &Topology) -> Result<LoopHandle, SimError> {
        let _starting = self.starting.lock().await;
        if self.state() == LoopState::Running {
            return Err(SimError::AlreadyRunning);
        }
        if let Some(err) = self.settings.validate().into_iter().next() {
            return Err(err.into());
        }
        topology.validate()?;

        let controller = SetPointController::from_settings(&self.settings);
        let timeout_ms = self.settings.store_timeout_ms;
        let seed = {
            let mut rng = match self.settings.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            controller.seed_readings(&topology.points, self.clock.now_ms(), &mut rng)?
        };
        let seeded = seed.len();
        if !seed.is_empty() {
            guarded("insert_many", timeout_ms, self.store.insert_many(seed)).await?;
        }
        info!(
            points = seeded,
            rooms = topology.rooms.len(),
            buildings = topology.buildings.len(),
            "seeded store"
        );

        let cancel = Arc::new(watch::channel(false).0);
        let (stats_tx, stats_rx) = watch::channel(LoopStats::default());
        let (run_state_tx, run_state_rx) = watch::channel(LoopState::Running);
        let run = LoopRun {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            controller,
            interval: Duration::from_millis(self.settings.recalc_interval_ms),
            timeout_ms,
            state: run_state_tx,
            latest_state: Arc::clone(&self.state),
            stats: stats_tx,
            cancel_rx: cancel.subscribe(),
            _cancel: Arc::clone(&cancel),
        };

        self.state.send_replace(LoopState::Running);
        info!(
            interval_ms = self.settings.recalc_interval_ms,
            "control loop running"
        );
        let task = tokio::spawn(run.run());

        Ok(LoopHandle {
            cancel,
            state: run_state_rx,
            stats: stats_rx,
            task,
        })
    }
}

/// Handle to one loop run.
///
/// Its state and stats belong to this run only, so a handle kept across a
/// restart keeps reporting the run it was returned for. Dropping it does not
/// stop the loop; call [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct LoopHandle {
    cancel: Arc<watch::Sender<bool>>,
    state: watch::Receiver<LoopState>,
    stats: watch::Receiver<LoopStats>,
    task: JoinHandle<Result<(), SimError>>,
}

impl LoopHandle {
    /// Requests a stop.
    ///
    /// An in-flight tick finishes its store calls; a pending sleep is woken
    /// immediately and no further tick runs. Idempotent.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> LoopStats {
        *self.stats.borrow()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<LoopStats> {
        self.stats.clone()
    }

    /// Resolves once the run reaches `Stopped` or `Failed`.
    pub async fn wait_for_exit(&self) -> LoopState {
        let mut state = self.state.clone();
        if let Ok(terminal) = state.wait_for(|s| s.is_terminal()).await {
            return *terminal;
        }
        *state.borrow()
    }

    /// Waits for the task and returns its final state.
    ///
    /// # Errors
    ///
    /// The error that moved the run to `Failed`, or [`SimError::Task`] if
    /// the task panicked or was aborted.
    pub async fn join(self) -> Result<LoopState, SimError> {
        let outcome = self.task.await.map_err(|err| SimError::Task {
            message: err.to_string(),
        })?;
        outcome.map(|()| LoopState::Stopped)
    }
}

/// Everything one spawned run owns.
struct LoopRun<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    controller: SetPointController,
    interval: Duration,
    timeout_ms: Option<u64>,
    /// This run's state.
    state: watch::Sender<LoopState>,
    /// Scheduler-wide mirror read by [`Scheduler::state`].
    latest_state: Arc<watch::Sender<LoopState>>,
    stats: watch::Sender<LoopStats>,
    cancel_rx: watch::Receiver<bool>,
    // Keeps `cancel_rx.changed()` from erroring if the handle is dropped.
    _cancel: Arc<watch::Sender<bool>>,
}

impl<S: TimeSeriesStore + 'static> LoopRun<S> {
    async fn run(mut self) -> Result<(), SimError> {
        let mut totals = LoopStats::default();
        loop {
            if *self.cancel_rx.borrow_and_update() {
                break;
            }

            match self.tick(totals.ticks).await {
                Ok(report) => {
                    debug!(
                        tick = report.tick,
                        rooms = report.rooms,
                        skipped = report.rooms_skipped,
                        staged = report.staged,
                        "tick complete"
                    );
                    totals.record(report);
                    self.stats.send_replace(totals);
                }
                Err(err) => {
                    error!(tick = totals.ticks, error = %err, "control loop failed");
                    self.publish(LoopState::Failed);
                    return Err(err);
                }
            }

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                _ = self.cancel_rx.changed() => {}
            }
        }

        self.publish(LoopState::Stopped);
        info!(
            ticks = totals.ticks,
            records = totals.records_written,
            "control loop stopped"
        );
        Ok(())
    }

    fn publish(&self, state: LoopState) {
        self.latest_state.send_replace(state);
        self.state.send_replace(state);
    }

    async fn tick(&self, tick: u64) -> Result<TickReport, SimError> {
        let rooms = guarded(
            "latest_per_room",
            self.timeout_ms,
            self.store.latest_per_room(),
        )
        .await?;
        let time = self.clock.now_ms();
        let plan = self.controller.plan(&rooms, time)?;
        if plan.rooms_skipped > 0 {
            debug!(tick, skipped = plan.rooms_skipped, "rooms without a set point");
        }

        let staged = plan.updates.len();
        if staged > 0 {
            guarded(
                "insert_many",
                self.timeout_ms,
                self.store.insert_many(plan.updates),
            )
            .await?;
        }

        Ok(TickReport {
            tick,
            time,
            rooms: plan.rooms,
            rooms_skipped: plan.rooms_skipped,
            staged,
        })
    }
}

/// Awaits a store call, bounded by `timeout_ms` when set.
async fn guarded<T>(
    operation: &'static str,
    timeout_ms: Option<u64>,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, SimError> {
    let Some(ms) = timeout_ms else {
        return Ok(call.await?);
    };
    match tokio::time::timeout(Duration::from_millis(ms), call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SimError::StoreTimeout {
            operation,
            timeout_ms: ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::clock::SteppedClock;
    use crate::store::MemoryStore;
    use crate::topology::GeoSeed;

    fn settings() -> SimulationSettings {
        SimulationSettings {
            seed: Some(11),
            ..SimulationSettings::default()
        }
    }

    fn demo() -> Topology {
        GeoSeed::demo().into_topology().expect("demo seed resolves")
    }

    #[tokio::test(start_paused = true)]
    async fn start_seeds_one_record_per_point() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Scheduler::new(Arc::clone(&store), settings())
            .with_clock(SteppedClock::new(1_000, 1));
        let topology = demo();

        let handle = scheduler.start(&topology).await.expect("start");
        assert_eq!(scheduler.state(), LoopState::Running);
        handle.cancel();
        assert_eq!(handle.join().await.expect("join"), LoopState::Stopped);

        let records = store.records().await;
        assert!(records.len() >= topology.points.len());
        assert!(records[..topology.points.len()].iter().all(|r| r.time == 1_000));
        assert_eq!(scheduler.state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_while_running_is_rejected() {
        let scheduler = Scheduler::new(Arc::new(MemoryStore::new()), settings());
        let topology = demo();
        let handle = scheduler.start(&topology).await.expect("start");

        let again = scheduler.start(&topology).await;
        assert!(matches!(again, Err(SimError::AlreadyRunning)));

        handle.cancel();
        assert_eq!(handle.wait_for_exit().await, LoopState::Stopped);
    }

    #[tokio::test]
    async fn invalid_settings_fail_before_spawning() {
        let store = Arc::new(MemoryStore::new());
        let bad = SimulationSettings {
            precision: 0.0,
            ..settings()
        };
        let scheduler = Scheduler::new(Arc::clone(&store), bad);
        let result = scheduler.start(&demo()).await;
        assert!(matches!(result, Err(SimError::Config(e)) if e.field == "simulation.precision"));
        assert_eq!(scheduler.state(), LoopState::Idle);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn guard_passes_through_without_timeout() {
        let ok = guarded("insert_many", None, async { Ok::<_, StoreError>(5) }).await;
        assert_eq!(ok.ok(), Some(5));

        let err = guarded("insert_many", Some(50), async {
            Err::<(), _>(StoreError::Backend {
                message: "down".into(),
            })
        })
        .await;
        assert!(matches!(err, Err(SimError::Store(StoreError::Backend { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn guard_times_out_hanging_call() {
        let err = guarded(
            "latest_per_room",
            Some(100),
            std::future::pending::<Result<(), StoreError>>(),
        )
        .await;
        assert!(matches!(
            err,
            Err(SimError::StoreTimeout {
                operation: "latest_per_room",
                timeout_ms: 100
            })
        ));
    }
}
