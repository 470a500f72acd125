//! The coordinator: run lifecycle, global reduction and termination.
//!
//! [`Simulation`] is the user-facing handle for one run. It spawns one
//! thread per partition, then drives them in lockstep: each
//! [`tick()`](Simulation::tick) broadcasts a step directive, waits for every
//! worker's report, sums the tallies, checks the ownership ledger and
//! forwards the log records to the [`RunSink`].
//!
//! # States
//!
//! ```text
//! Initializing ──► Running ──► Terminating ──► Terminated
//! ```
//!
//! `Initializing` covers spawning, population and the tick-0 evaluation and
//! lasts only for the duration of [`launch()`](Simulation::launch). The run
//! leaves `Running` when a tick converges or reaches `max_ticks`, or when
//! the caller calls [`finish()`](Simulation::finish). Any error moves the
//! run straight to `Terminated`.
//!
//! # Shutdown
//!
//! Dropping a `Simulation` sends every worker an abort and joins its thread.
//! A worker blocked on a lost peer exits once `peer_timeout` of silence
//! has passed.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use enclave_core::{AgentId, TickId, WorkerId};
use enclave_metric::{GlobalSnapshot, MoranI};
use tracing::{debug, info, warn};

use crate::config::{RunConfig, RunPlan};
use crate::error::EngineError;
use crate::ledger::OwnershipLedger;
use crate::metrics::TickMetrics;
use crate::sink::{AggregateRow, RunSink};
use crate::transport::{Directive, Mailbox, WorkerEvent, WorkerReport};
use crate::worker::Worker;

// ── Public types ───────────────────────────────────────────────

/// Lifecycle state of a [`Simulation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Workers are being spawned and populated.
    Initializing,
    /// Ticks may be run.
    Running,
    /// A termination condition was met; the final gather is pending.
    Terminating,
    /// Workers have exited.
    Terminated,
}

/// Why a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// No agent was unsatisfied.
    Converged,
    /// `max_ticks` was reached.
    TickLimit,
    /// The caller called [`Simulation::finish`] while still running.
    Requested,
}

/// Final result of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Ticks executed after initialisation.
    pub ticks: u64,
    /// Why the run stopped.
    pub reason: TerminationReason,
    /// Tally of the last reduced tick.
    pub final_tally: AggregateRow,
    /// Global Moran's I over the final layout.
    pub metric: MoranI,
    /// FNV-1a hash of the final layout.
    pub state_hash: u64,
    /// The final layout.
    pub snapshot: GlobalSnapshot,
}

/// Result of one [`Simulation::tick`].
#[derive(Clone, Debug, PartialEq)]
pub struct TickOutcome {
    /// The tick that ran.
    pub tick: TickId,
    /// Reduced tally.
    pub tally: AggregateRow,
    /// Merged worker metrics.
    pub metrics: TickMetrics,
    /// Set when this tick ended the run.
    pub termination: Option<TerminationReason>,
}

// ── WorkerPool ─────────────────────────────────────────────────

/// Worker threads plus the coordinator's ends of their channels.
struct WorkerPool {
    directives: Vec<Sender<Directive>>,
    events: Receiver<WorkerEvent>,
    handles: Vec<JoinHandle<()>>,
    timeout: Duration,
}

impl WorkerPool {
    fn spawn(plan: &Arc<RunPlan>) -> Result<Self, EngineError> {
        let n = plan.layout.worker_count();
        let (event_tx, events) = crossbeam_channel::unbounded();
        let mut pool = Self {
            directives: Vec::with_capacity(n as usize),
            events,
            handles: Vec::with_capacity(n as usize),
            // Leave room for a worker to notice a lost peer and say so.
            timeout: plan.config.peer_timeout * 2,
        };

        for (i, mailbox) in Mailbox::mesh(n, plan.config.peer_timeout)
            .into_iter()
            .enumerate()
        {
            let id = WorkerId(i as u32);
            let (tx, rx) = crossbeam_channel::unbounded();
            let worker = Worker::new(id, Arc::clone(plan), mailbox, rx, event_tx.clone());
            let handle = thread::Builder::new()
                .name(format!("enclave-worker-{i}"))
                .spawn(move || worker.run())
                .map_err(|e| EngineError::ThreadSpawnFailed {
                    reason: format!("worker {i}: {e}"),
                })?;
            pool.directives.push(tx);
            pool.handles.push(handle);
        }
        Ok(pool)
    }

    fn broadcast(&self, directive: Directive) -> Result<(), EngineError> {
        for (i, tx) in self.directives.iter().enumerate() {
            tx.send(directive).map_err(|_| EngineError::WorkerLost {
                worker: Some(WorkerId(i as u32)),
                detail: "directive channel closed".into(),
            })?;
        }
        Ok(())
    }

    fn next_event(&self, deadline: Instant, waiting: &str) -> Result<WorkerEvent, EngineError> {
        let left = deadline.saturating_duration_since(Instant::now());
        match self.events.recv_timeout(left) {
            Ok(WorkerEvent::Failed { worker, error }) => {
                warn!(worker = %worker, %error, "worker reported failure");
                Err(error)
            }
            Ok(event) => Ok(event),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::WorkerLost {
                worker: None,
                detail: format!("timed out waiting for {waiting}"),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::WorkerLost {
                worker: None,
                detail: "event channel closed".into(),
            }),
        }
    }

    /// One report per worker for `tick`, ordered by worker id.
    fn reports(&self, tick: TickId) -> Result<Vec<WorkerReport>, EngineError> {
        let n = self.directives.len();
        let mut slots: Vec<Option<WorkerReport>> = (0..n).map(|_| None).collect();
        let mut deadline = Instant::now() + self.timeout;

        while slots.iter().any(Option::is_none) {
            match self.next_event(deadline, "worker reports") {
                Ok(WorkerEvent::Report(r)) if r.tick == tick && r.worker.index() < n => {
                    let i = r.worker.index();
                    slots[i] = Some(r);
                    deadline = Instant::now() + self.timeout;
                }
                Ok(_) => {
                    return Err(EngineError::WorkerLost {
                        worker: None,
                        detail: format!("unexpected event while reducing tick {tick}"),
                    });
                }
                Err(EngineError::WorkerLost {
                    worker: None,
                    detail,
                }) => {
                    let silent = slots.iter().position(Option::is_none);
                    return Err(EngineError::WorkerLost {
                        worker: silent.map(|i| WorkerId(i as u32)),
                        detail,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }

    fn gathered(&self) -> Result<(GlobalSnapshot, MoranI), EngineError> {
        let deadline = Instant::now() + self.timeout;
        match self.next_event(deadline, "the final gather")? {
            WorkerEvent::Gathered { snapshot, metric } => Ok((snapshot, metric)),
            _ => Err(EngineError::WorkerLost {
                worker: Some(WorkerId::ROOT),
                detail: "unexpected event during the final gather".into(),
            }),
        }
    }

    fn join(&mut self) {
        for tx in &self.directives {
            let _ = tx.send(Directive::Abort);
        }
        self.directives.clear();
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_owned();
            if handle.join().is_err() {
                warn!(thread = %name, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}

// ── Simulation ─────────────────────────────────────────────────

/// A running multi-worker simulation.
///
/// # Example
///
/// ```ignore
/// let mut sim = Simulation::launch(RunConfig::default(), MemorySink::new())?;
/// while sim.state() == RunState::Running {
///     sim.tick()?;
/// }
/// let summary = sim.finish()?;
/// ```
pub struct Simulation<S: RunSink> {
    plan: Arc<RunPlan>,
    pool: WorkerPool,
    sink: S,
    state: RunState,
    tick: TickId,
    last: AggregateRow,
    ledger: OwnershipLedger,
    pending: Option<TerminationReason>,
    summary: Option<RunSummary>,
}

impl<S: RunSink> Simulation<S> {
    /// Validate `config`, spawn the workers, populate the grid and reduce
    /// tick 0.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] before anything is spawned; otherwise any
    /// failure during initialisation.
    pub fn launch(config: RunConfig, sink: S) -> Result<Self, EngineError> {
        let plan = Arc::new(config.plan()?);
        let (px, py) = plan.layout.dims();
        info!(
            width = plan.config.width,
            height = plan.config.height,
            workers = plan.layout.worker_count(),
            grid = format_args!("{px}x{py}"),
            agents = plan.total_agents(),
            neighbours = plan.topology.len(),
            seed = plan.config.seed,
            "initializing"
        );

        let pool = WorkerPool::spawn(&plan)?;
        let mut sim = Self {
            plan,
            pool,
            sink,
            state: RunState::Initializing,
            tick: TickId(0),
            last: AggregateRow::default(),
            ledger: OwnershipLedger::default(),
            pending: None,
            summary: None,
        };

        let (tally, _) = sim.reduce(TickId(0))?;
        sim.enter(RunState::Running);
        if let Some(reason) = sim.termination(&tally) {
            sim.pending = Some(reason);
            sim.enter(RunState::Terminating);
        }
        Ok(sim)
    }

    /// Launch, tick until a termination condition holds, then finish.
    pub fn run(config: RunConfig, sink: S) -> Result<RunSummary, EngineError> {
        let mut sim = Self::launch(config, sink)?;
        while sim.state == RunState::Running {
            sim.tick()?;
        }
        sim.finish()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The last reduced tick (0 right after launch).
    pub fn current_tick(&self) -> TickId {
        self.tick
    }

    /// Tally of the last reduced tick.
    pub fn last_tally(&self) -> AggregateRow {
        self.last
    }

    /// Worker owning `agent` after the last reduced tick.
    pub fn owner_of(&self, agent: AgentId) -> Option<WorkerId> {
        self.ledger.owner(agent)
    }

    /// The sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the simulation, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run one tick on every worker and reduce the results.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotRunning`] outside the `Running` state. Any worker
    /// or ledger failure terminates the run.
    pub fn tick(&mut self) -> Result<TickOutcome, EngineError> {
        if self.state != RunState::Running {
            return Err(EngineError::NotRunning { state: self.state });
        }
        let tick = self.tick.next();
        if let Err(e) = self.pool.broadcast(Directive::Step(tick)) {
            return Err(self.fail(e));
        }
        let (tally, metrics) = self.reduce(tick)?;

        let termination = self.termination(&tally);
        if let Some(reason) = termination {
            self.pending = Some(reason);
            self.enter(RunState::Terminating);
        }
        Ok(TickOutcome {
            tick,
            tally,
            metrics,
            termination,
        })
    }

    /// Gather the final layout, compute the metric and stop the workers.
    ///
    /// From `Running` the reason is [`TerminationReason::Requested`]. Once
    /// terminated, returns the same summary again.
    pub fn finish(&mut self) -> Result<RunSummary, EngineError> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }
        match self.state {
            RunState::Running | RunState::Terminating => {}
            state => return Err(EngineError::NotRunning { state }),
        }
        let reason = self.pending.unwrap_or(TerminationReason::Requested);
        self.enter(RunState::Terminating);

        if let Err(e) = self.pool.broadcast(Directive::Terminate) {
            return Err(self.fail(e));
        }
        let (snapshot, metric) = match self.pool.gathered() {
            Ok(g) => g,
            Err(e) => return Err(self.fail(e)),
        };
        self.pool.join();

        let summary = RunSummary {
            ticks: self.tick.0,
            reason,
            final_tally: self.last,
            metric,
            state_hash: snapshot.state_hash(),
            snapshot,
        };
        self.enter(RunState::Terminated);
        info!(
            ticks = summary.ticks,
            reason = ?summary.reason,
            morans_i = %summary.metric,
            "run finished"
        );
        self.sink.finished(&summary);
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    // ── Internals ──────────────────────────────────────────────

    /// The global reduction for `tick`.
    fn reduce(&mut self, tick: TickId) -> Result<(AggregateRow, TickMetrics), EngineError> {
        let reports = match self.pool.reports(tick) {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };

        let ledger =
            OwnershipLedger::build(reports.iter().map(|r| (r.worker, r.owned.as_slice())));
        if let Err(e) = ledger.verify(&self.plan.shares) {
            return Err(self.fail(e));
        }
        self.ledger = ledger;

        let mut tally = AggregateRow {
            tick,
            ..AggregateRow::default()
        };
        let mut metrics = TickMetrics::default();
        for report in &reports {
            tally.total_satisfied += report.satisfied;
            tally.total_agents += report.total;
            metrics.merge(&report.metrics);
            if !report.rows.is_empty() {
                self.sink.agent_rows(&report.rows);
            }
        }
        self.sink.aggregate(&tally);
        debug!(
            tick = %tick,
            satisfied = tally.total_satisfied,
            agents = tally.total_agents,
            owners = self.ledger.len(),
            percent = tally.percent_satisfied(),
            migrants = metrics.migrants_sent,
            "reduced"
        );

        self.tick = tick;
        self.last = tally;
        Ok((tally, metrics))
    }

    fn termination(&self, tally: &AggregateRow) -> Option<TerminationReason> {
        if tally.unsatisfied() == 0 {
            Some(TerminationReason::Converged)
        } else if tally.tick.0 >= self.plan.config.max_ticks {
            Some(TerminationReason::TickLimit)
        } else {
            None
        }
    }

    fn enter(&mut self, state: RunState) {
        if self.state != state {
            info!(from = ?self.state, to = ?state, tick = %self.tick, "state change");
            self.state = state;
        }
    }

    /// Abort the workers and record the failure.
    fn fail(&mut self, error: EngineError) -> EngineError {
        warn!(tick = %self.tick, %error, "run failed");
        self.pool.join();
        self.enter(RunState::Terminated);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, NullSink};

    fn small() -> RunConfig {
        RunConfig {
            width: 8,
            height: 8,
            workers: 2,
            max_ticks: 5,
            peer_timeout: Duration::from_secs(10),
            ..RunConfig::default()
        }
    }

    #[test]
    fn launch_reduces_tick_zero() {
        let sim = Simulation::launch(small(), MemorySink::new()).unwrap();
        assert_eq!(sim.current_tick(), TickId(0));
        assert_eq!(sim.sink().aggregates.len(), 1);
        assert_eq!(sim.last_tally().total_agents, 51);
        assert_eq!(sim.sink().agents_at(TickId(0)).count(), 51);
    }

    #[test]
    fn invalid_config_spawns_nothing() {
        let cfg = RunConfig {
            threshold: -0.1,
            ..small()
        };
        assert!(matches!(
            Simulation::launch(cfg, NullSink),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn zero_ticks_terminates_after_init() {
        let cfg = RunConfig {
            max_ticks: 0,
            threshold: 1.0,
            ..small()
        };
        let mut sim = Simulation::launch(cfg, NullSink).unwrap();
        assert_eq!(sim.state(), RunState::Terminating);
        assert!(matches!(
            sim.tick(),
            Err(EngineError::NotRunning {
                state: RunState::Terminating
            })
        ));
        let summary = sim.finish().unwrap();
        assert_eq!(summary.ticks, 0);
        assert_eq!(summary.reason, TerminationReason::TickLimit);
        assert_eq!(sim.state(), RunState::Terminated);
    }

    #[test]
    fn finish_from_running_is_requested_and_idempotent() {
        let cfg = RunConfig {
            threshold: 1.0,
            ..small()
        };
        let mut sim = Simulation::launch(cfg, NullSink).unwrap();
        sim.tick().unwrap();
        let summary = sim.finish().unwrap();
        assert_eq!(summary.reason, TerminationReason::Requested);
        assert_eq!(summary.ticks, 1);
        assert_eq!(sim.finish().unwrap(), summary);
        assert!(matches!(
            sim.tick(),
            Err(EngineError::NotRunning {
                state: RunState::Terminated
            })
        ));
    }

    #[test]
    fn empty_world_converges_at_once() {
        let cfg = RunConfig {
            agent_count: Some(0),
            ..small()
        };
        let summary = Simulation::run(cfg, NullSink).unwrap();
        assert_eq!(summary.reason, TerminationReason::Converged);
        assert_eq!(summary.final_tally.percent_satisfied(), 1.0);
        assert!(!summary.metric.is_defined());
    }
}
