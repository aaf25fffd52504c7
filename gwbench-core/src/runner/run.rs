use rand::SeedableRng as _;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Barrier, Notify};
use tokio::time::MissedTickBehavior;

use crate::HttpClient;

use super::catalog::{BuildContext, ScenarioCatalog};
use super::config::{RunConfig, RunMode};
use super::error::Result;
use super::executor::RequestExecutor;
use super::gate::IterationGate;
use super::progress::{ProgressFn, ProgressUpdate};
use super::recorder::{MetricsRecorder, MetricsSnapshot};

/// Run lifecycle. `Done` is terminal; the recorder is not mutated past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    /// Stop signal fired; in-flight requests are completing, no new
    /// iterations start.
    Draining = 2,
    Done = 3,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunState::Idle,
            1 => RunState::Running,
            2 => RunState::Draining,
            _ => RunState::Done,
        }
    }
}

/// Cloneable stop signal for a run in flight. Observed by every VU loop at
/// the top of its next iteration; in-flight requests are allowed to finish.
#[derive(Debug, Clone)]
pub struct StopHandle {
    gate: Arc<IterationGate>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.gate.stop();
    }
}

type HookFn = Arc<dyn Fn() -> std::result::Result<(), String> + Send + Sync>;

/// Optional user callbacks at run start and end. Hook failures are logged and
/// never abort the run or touch metrics.
#[derive(Clone, Default)]
pub struct RunHooks {
    pub setup: Option<HookFn>,
    pub teardown: Option<HookFn>,
}

impl std::fmt::Debug for RunHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHooks")
            .field("setup", &self.setup.is_some())
            .field("teardown", &self.teardown.is_some())
            .finish()
    }
}

/// Final result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot: MetricsSnapshot,
    pub elapsed: Duration,
}

/// Owns the virtual-user fleet for one run.
///
/// State machine: Idle → Running (VUs launched) → Draining (stop condition
/// fired, in-flight requests finishing) → Done (all VUs joined, final
/// snapshot taken).
pub struct RunController {
    config: RunConfig,
    catalog: Arc<ScenarioCatalog>,
    recorder: Arc<MetricsRecorder>,
    gate: Arc<IterationGate>,
    state: Arc<AtomicU8>,
}

struct VuContext {
    vu_id: u64,
    catalog: Arc<ScenarioCatalog>,
    executor: Arc<RequestExecutor>,
    recorder: Arc<MetricsRecorder>,
    gate: Arc<IterationGate>,
    ready_barrier: Arc<Barrier>,
    start_signal: Arc<StartSignal>,
}

#[derive(Debug)]
struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    async fn wait(&self) {
        while !self.started.load(Ordering::Acquire) {
            self.notify.notified().await;
        }
    }
}

impl RunController {
    pub fn new(config: RunConfig, catalog: ScenarioCatalog) -> Result<Self> {
        config.validate()?;

        let gate = match config.mode {
            RunMode::Duration(d) => IterationGate::new(None, Some(d)),
            RunMode::Iterations(n) => IterationGate::new(Some(n), None),
        };

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            recorder: Arc::new(MetricsRecorder::default()),
            gate: Arc::new(gate),
            state: Arc::new(AtomicU8::new(RunState::Idle as u8)),
        })
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Handle for signalling an explicit abort from outside the run.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            gate: self.gate.clone(),
        }
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::Release);
        tracing::debug!(state = %state, "run state changed");
    }

    /// Execute the run to completion and return the final snapshot.
    ///
    /// VU startup happens behind a ready barrier so connection setup does not
    /// skew the measured window; the gate's clock starts when all VUs are
    /// ready.
    pub async fn run(self, hooks: RunHooks, progress: Option<ProgressFn>) -> Result<RunReport> {
        if let Some(setup) = &hooks.setup
            && let Err(err) = setup()
        {
            tracing::warn!(error = %err, "setup hook failed; continuing run");
        }

        let executor = Arc::new(RequestExecutor::new(
            HttpClient::default(),
            self.config.request_timeout,
        ));

        let vus = self.config.concurrency;
        let ready_barrier = Arc::new(Barrier::new(vus as usize + 1));
        let start_signal = Arc::new(StartSignal::new());

        let mut handles = Vec::with_capacity(vus as usize);
        for vu_id in 1..=vus {
            let ctx = VuContext {
                vu_id,
                catalog: self.catalog.clone(),
                executor: executor.clone(),
                recorder: self.recorder.clone(),
                gate: self.gate.clone(),
                ready_barrier: ready_barrier.clone(),
                start_signal: start_signal.clone(),
            };
            handles.push(tokio::spawn(vu_loop(ctx)));
        }

        ready_barrier.wait().await;

        let started = Instant::now();
        self.gate.start_at(started);
        self.set_state(RunState::Running);
        start_signal.start();

        let progress_handle = progress.map(|progress| {
            let recorder = self.recorder.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(1));
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick fires immediately; skip it.
                interval.tick().await;

                let mut tick: u64 = 0;
                let mut last_at = Instant::now();
                let mut last_total = recorder.requests_total();
                loop {
                    interval.tick().await;
                    tick = tick.saturating_add(1);

                    let now = Instant::now();
                    let dt = now.duration_since(last_at);
                    last_at = now;

                    let total = recorder.requests_total();
                    let delta = total.saturating_sub(last_total);
                    last_total = total;

                    (progress)(ProgressUpdate {
                        tick,
                        elapsed: started.elapsed(),
                        requests_total: total,
                        failed_total: recorder.failed_total(),
                        rps_now: (delta as f64) / dt.as_secs_f64().max(1e-9),
                        latency_p50_ms: recorder.latency_percentile_ms(50.0),
                        latency_p95_ms: recorder.latency_percentile_ms(95.0),
                    });
                }
            })
        });

        // Mark Draining as soon as the stop condition fires, then join the
        // fleet; joining is what guarantees in-flight requests finished.
        let drain_watch = {
            let gate = self.gate.clone();
            let state = self.state.clone();
            let deadline = match self.config.mode {
                RunMode::Duration(d) => Some(started + d),
                RunMode::Iterations(_) => None,
            };
            tokio::spawn(async move {
                loop {
                    let deadline_passed =
                        deadline.is_some_and(|deadline| Instant::now() >= deadline);
                    if gate.is_stopped() || gate.is_exhausted() || deadline_passed {
                        state.store(RunState::Draining as u8, Ordering::Release);
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        };

        for h in handles {
            h.await?;
        }

        drain_watch.abort();
        let _ = drain_watch.await;

        if let Some(h) = progress_handle {
            h.abort();
            let _ = h.await;
        }

        let elapsed = started.elapsed();
        self.set_state(RunState::Done);

        if let Some(teardown) = &hooks.teardown
            && let Err(err) = teardown()
        {
            tracing::warn!(error = %err, "teardown hook failed");
        }

        // The recorder is consumed here; nothing can mutate metrics past Done.
        let snapshot = self.recorder.snapshot();
        Ok(RunReport { snapshot, elapsed })
    }
}

async fn vu_loop(ctx: VuContext) {
    // Keep initialization out of the measured window.
    ctx.ready_barrier.wait().await;
    ctx.start_signal.wait().await;

    let mut rng = StdRng::from_entropy();
    let mut iteration: u64 = 0;

    while ctx.gate.next() {
        let definition = ctx.catalog.select_with(&mut rng);
        let spec = definition.build(&mut BuildContext {
            vu_id: ctx.vu_id,
            iteration,
            rng: &mut rng,
        });
        let outcome = ctx.executor.execute(definition.name().clone(), spec).await;
        ctx.recorder.record(&outcome);
        iteration = iteration.saturating_add(1);
    }
}
