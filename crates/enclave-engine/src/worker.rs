//! One partition's thread: population, per-tick steps and the exchange.
//!
//! A worker owns its [`SpatialPartition`], [`AgentCache`] and RNG stream
//! outright. It talks to neighbours only through its [`Mailbox`] and to the
//! coordinator only through a directive receiver and an event sender.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use enclave_core::{AgentId, Coord, Group, TickId, WorkerId};
use enclave_metric::{morans_i, GlobalSnapshot};
use enclave_migrate::{
    admit_migrants, ghost_parcels, pack_migrants, refresh_ghosts, settle_departures, AgentCache,
    Parcel,
};
use enclave_space::SpatialPartition;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::config::RunPlan;
use crate::error::EngineError;
use crate::metrics::TickMetrics;
use crate::policy::{evaluate_owned, populate, relocate_unsatisfied, Tally};
use crate::sink::AgentRow;
use crate::transport::{Directive, Mailbox, PeerBody, Phase, WorkerEvent, WorkerReport};

/// Seed of worker `id`'s private stream.
pub(crate) fn worker_seed(seed: u64, id: WorkerId) -> u64 {
    seed ^ u64::from(id.0).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

pub(crate) struct Worker {
    id: WorkerId,
    plan: Arc<RunPlan>,
    partition: SpatialPartition,
    cache: AgentCache,
    neighbours: SmallVec<[WorkerId; 8]>,
    rng: ChaCha8Rng,
    mailbox: Mailbox,
    directives: Receiver<Directive>,
    events: Sender<WorkerEvent>,
    tick: TickId,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        plan: Arc<RunPlan>,
        mailbox: Mailbox,
        directives: Receiver<Directive>,
        events: Sender<WorkerEvent>,
    ) -> Self {
        let partition = SpatialPartition::from_layout(&plan.layout, id);
        let neighbours = plan.layout.neighbours_of(id);
        let rng = ChaCha8Rng::seed_from_u64(worker_seed(plan.config.seed, id));
        Self {
            id,
            plan,
            partition,
            cache: AgentCache::new(),
            neighbours,
            rng,
            mailbox,
            directives,
            events,
            tick: TickId(0),
        }
    }

    /// Thread body. Errors are reported to the coordinator, never raised.
    pub fn run(mut self) {
        if let Err(error) = self.drive() {
            warn!(worker = %self.id, tick = %self.tick, %error, "worker failed");
            let _ = self.events.send(WorkerEvent::Failed {
                worker: self.id,
                error,
            });
        }
    }

    fn drive(&mut self) -> Result<(), EngineError> {
        self.initialise()?;
        loop {
            // A closed directive channel means the coordinator is gone.
            let Ok(directive) = self.directives.recv() else {
                return Ok(());
            };
            match directive {
                Directive::Step(tick) => self.step(tick)?,
                Directive::Terminate => return self.gather(),
                Directive::Abort => return Ok(()),
            }
        }
    }

    // ── Tick 0 ─────────────────────────────────────────────────

    fn initialise(&mut self) -> Result<(), EngineError> {
        let started = Instant::now();
        let share = self.plan.shares[self.id.index()];
        populate(&mut self.partition, share, &self.plan.config, &mut self.rng)?;
        debug!(worker = %self.id, agents = share, bounds = %self.partition.bounds(), "populated");

        let mut metrics = TickMetrics::default();
        self.exchange_ghosts(TickId(0), &mut metrics)?;
        let tally = evaluate_owned(&mut self.partition, &self.plan.topology)?;
        metrics.step_us = elapsed_us(started);
        // Second pass so neighbours mirror the evaluated flags.
        self.exchange_ghosts(TickId(0), &mut metrics)?;
        self.report(TickId(0), tally, metrics)
    }

    // ── Tick t ─────────────────────────────────────────────────

    fn step(&mut self, tick: TickId) -> Result<(), EngineError> {
        self.tick = tick;
        let config = &self.plan.config;
        let mut metrics = TickMetrics::default();

        let started = Instant::now();
        let tally = evaluate_owned(&mut self.partition, &self.plan.topology)?;
        let moves = relocate_unsatisfied(
            &mut self.partition,
            config.relocation_scope,
            config.max_relocation_attempts,
            &mut self.rng,
        )?;
        metrics.step_us = elapsed_us(started);
        metrics.relocation_attempts = moves.attempted;
        metrics.local_moves = moves.local;
        metrics.stuck = moves.stuck;

        let started = Instant::now();
        self.exchange_migrants(tick, &mut metrics)?;
        self.exchange_ghosts(tick, &mut metrics)?;
        metrics.exchange_us = elapsed_us(started);

        debug_assert!(self.partition.is_consistent());
        trace!(worker = %self.id, tick = %tick, ?metrics, "step done");
        self.report(tick, tally, metrics)
    }

    /// Phases 1 and 2: hand migrants over, then settle on the replies.
    fn exchange_migrants(
        &mut self,
        tick: TickId,
        metrics: &mut TickMetrics,
    ) -> Result<(), EngineError> {
        let mut outgoing = pack_migrants(&mut self.partition, &self.plan.layout)?;
        for &n in &self.neighbours {
            let batch = outgoing.shift_remove(&n).unwrap_or_default();
            metrics.migrants_sent += batch.len() as u64;
            self.mailbox.send(n, tick, PeerBody::Migrants(batch))?;
        }
        // Never sent, so never acknowledged: settled below as restored.
        for (owner, batch) in &outgoing {
            warn!(
                worker = %self.id,
                owner = %owner,
                count = batch.len(),
                "destination owner is not a neighbour"
            );
        }

        let inbox = self
            .mailbox
            .collect(tick, Phase::Migrants, &self.neighbours)?
            .into_iter()
            .filter_map(|(from, body)| match body {
                PeerBody::Migrants(p) => Some((from, p)),
                _ => None,
            })
            .collect();
        let admission = admit_migrants(&mut self.partition, &mut self.cache, tick, inbox);
        metrics.corrupt_records += admission.corrupt as u64;

        for &n in &self.neighbours {
            let ids = admission.accepted.get(&n).cloned().unwrap_or_default();
            metrics.migrants_accepted += ids.len() as u64;
            self.mailbox.send(n, tick, PeerBody::Acks(ids))?;
        }

        let accepted: HashSet<AgentId> = self
            .mailbox
            .collect(tick, Phase::Acks, &self.neighbours)?
            .into_iter()
            .flat_map(|(_, body)| match body {
                PeerBody::Acks(ids) => ids,
                _ => Vec::new(),
            })
            .collect();
        let settlement = settle_departures(&mut self.partition, &accepted)?;
        metrics.migrants_restored += settlement.restored as u64;
        Ok(())
    }

    /// Phase 3: mirror neighbours' border agents.
    fn exchange_ghosts(
        &mut self,
        tick: TickId,
        metrics: &mut TickMetrics,
    ) -> Result<(), EngineError> {
        for &n in &self.neighbours {
            let view = self.plan.layout.view_of(n);
            let parcels = ghost_parcels(&self.partition, &view);
            self.mailbox.send(n, tick, PeerBody::Ghosts(parcels))?;
        }
        let inbox: Vec<(WorkerId, Vec<Parcel>)> = self
            .mailbox
            .collect(tick, Phase::Ghosts, &self.neighbours)?
            .into_iter()
            .filter_map(|(from, body)| match body {
                PeerBody::Ghosts(p) => Some((from, p)),
                _ => None,
            })
            .collect();
        let refresh = refresh_ghosts(&mut self.partition, &mut self.cache, tick, inbox);
        metrics.corrupt_records += refresh.corrupt as u64;
        metrics.ghosts = refresh.installed as u64;
        Ok(())
    }

    fn report(
        &mut self,
        tick: TickId,
        tally: Tally,
        metrics: TickMetrics,
    ) -> Result<(), EngineError> {
        let mut agents = self.partition.owned_agents();
        agents.sort_unstable_by_key(|(agent, _)| agent.id);

        let rows = if self.plan.config.log_agents {
            agents
                .iter()
                .map(|(agent, at)| AgentRow {
                    tick,
                    agent_id: agent.id,
                    owning_worker: self.id,
                    group: agent.group,
                    satisfied: agent.satisfied,
                    x: at.x,
                    y: at.y,
                })
                .collect()
        } else {
            Vec::new()
        };

        let report = WorkerReport {
            worker: self.id,
            tick,
            satisfied: tally.satisfied,
            total: tally.total,
            owned: agents.iter().map(|(agent, _)| agent.id).collect(),
            rows,
            metrics,
        };
        self.events
            .send(WorkerEvent::Report(report))
            .map_err(|_| EngineError::WorkerLost {
                worker: None,
                detail: "coordinator disconnected".into(),
            })
    }

    // ── Termination ────────────────────────────────────────────

    /// Send owned agents to the root worker, which builds the snapshot and
    /// computes the metric.
    fn gather(&mut self) -> Result<(), EngineError> {
        let mine: Vec<(Coord, Group)> = self
            .partition
            .owned_agents()
            .into_iter()
            .map(|(agent, at)| (at, agent.group))
            .collect();

        if self.id != WorkerId::ROOT {
            return self.mailbox.send(WorkerId::ROOT, self.tick, PeerBody::Gather(mine));
        }

        let world = self.plan.layout.world();
        let mut snapshot = GlobalSnapshot::new(world.width, world.height);
        for (at, group) in mine {
            snapshot.set(at, group)?;
        }
        let others: Vec<WorkerId> = self.plan.layout.workers().filter(|w| *w != self.id).collect();
        for (_, body) in self.mailbox.collect(self.tick, Phase::Gather, &others)? {
            if let PeerBody::Gather(cells) = body {
                for (at, group) in cells {
                    snapshot.set(at, group)?;
                }
            }
        }

        let metric = morans_i(&snapshot);
        debug!(occupied = snapshot.occupied(), %metric, "gathered");
        self.events
            .send(WorkerEvent::Gathered { snapshot, metric })
            .map_err(|_| EngineError::WorkerLost {
                worker: None,
                detail: "coordinator disconnected".into(),
            })
    }
}

fn elapsed_us(since: Instant) -> u64 {
    since.elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_streams_differ_and_root_keeps_the_seed() {
        assert_eq!(worker_seed(42, WorkerId::ROOT), 42);
        assert_ne!(worker_seed(42, WorkerId(1)), worker_seed(42, WorkerId(2)));
        assert_ne!(worker_seed(42, WorkerId(1)), worker_seed(43, WorkerId(1)));
    }
}
