//! Channels between workers and between workers and the coordinator.
//!
//! Workers share nothing: every cross-worker byte travels as a
//! [`PeerMessage`] over a crossbeam channel. Each worker holds a sender to
//! every worker and one receiver of its own. Messages are tagged with their
//! tick and phase; anything that arrives early is stashed until asked for.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use enclave_core::{AgentId, Coord, Group, TickId, WorkerId};
use enclave_metric::{GlobalSnapshot, MoranI};
use enclave_migrate::Parcel;

use crate::error::EngineError;
use crate::metrics::TickMetrics;
use crate::sink::AgentRow;

// ── Worker ↔ worker ────────────────────────────────────────────────

/// Exchange phase a message belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Phase {
    Migrants,
    Acks,
    Ghosts,
    Gather,
}

#[derive(Debug)]
pub(crate) enum PeerBody {
    Migrants(Vec<Parcel>),
    Acks(Vec<AgentId>),
    Ghosts(Vec<Parcel>),
    Gather(Vec<(Coord, Group)>),
}

impl PeerBody {
    fn phase(&self) -> Phase {
        match self {
            Self::Migrants(_) => Phase::Migrants,
            Self::Acks(_) => Phase::Acks,
            Self::Ghosts(_) => Phase::Ghosts,
            Self::Gather(_) => Phase::Gather,
        }
    }
}

#[derive(Debug)]
pub(crate) struct PeerMessage {
    from: WorkerId,
    tick: TickId,
    body: PeerBody,
}

/// One worker's end of the full mesh.
pub(crate) struct Mailbox {
    me: WorkerId,
    peers: Vec<Sender<PeerMessage>>,
    inbox: Receiver<PeerMessage>,
    stash: Vec<PeerMessage>,
    timeout: Duration,
}

impl Mailbox {
    /// Build every worker's mailbox for an `n`-worker mesh.
    pub fn mesh(n: u32, timeout: Duration) -> Vec<Mailbox> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..n).map(|_| crossbeam_channel::unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(i, inbox)| Mailbox {
                me: WorkerId(i as u32),
                peers: senders.clone(),
                inbox,
                stash: Vec::new(),
                timeout,
            })
            .collect()
    }

    pub fn send(&self, to: WorkerId, tick: TickId, body: PeerBody) -> Result<(), EngineError> {
        let msg = PeerMessage {
            from: self.me,
            tick,
            body,
        };
        self.peers[to.index()]
            .send(msg)
            .map_err(|_| EngineError::WorkerLost {
                worker: Some(to),
                detail: "peer channel disconnected".into(),
            })
    }

    /// Block until one `phase` message for `tick` has arrived from each of
    /// `from`. Returned in the order of `from`.
    ///
    /// The timeout restarts on every arrival, so a slow peer that keeps
    /// sending is never declared lost. Only `timeout` of total silence is.
    pub fn collect(
        &mut self,
        tick: TickId,
        phase: Phase,
        from: &[WorkerId],
    ) -> Result<Vec<(WorkerId, PeerBody)>, EngineError> {
        let mut slots: Vec<Option<PeerBody>> = from.iter().map(|_| None).collect();

        for msg in std::mem::take(&mut self.stash) {
            if let Some(back) = Self::place(msg, tick, phase, from, &mut slots) {
                self.stash.push(back);
            }
        }

        let mut deadline = Instant::now() + self.timeout;
        while slots.iter().any(Option::is_none) {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.inbox.recv_timeout(left) {
                Ok(msg) => {
                    deadline = Instant::now() + self.timeout;
                    if let Some(back) = Self::place(msg, tick, phase, from, &mut slots) {
                        self.stash.push(back);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let lost = from
                        .iter()
                        .zip(&slots)
                        .find(|(_, s)| s.is_none())
                        .map(|(w, _)| *w);
                    return Err(EngineError::WorkerLost {
                        worker: lost,
                        detail: format!("no {phase:?} message for tick {tick}"),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::WorkerLost {
                        worker: None,
                        detail: "mesh disconnected".into(),
                    });
                }
            }
        }

        Ok(from
            .iter()
            .copied()
            .zip(slots)
            .filter_map(|(w, s)| s.map(|b| (w, b)))
            .collect())
    }

    /// File `msg` into its slot, or hand it back if it is for another
    /// tick, phase or sender.
    fn place(
        msg: PeerMessage,
        tick: TickId,
        phase: Phase,
        from: &[WorkerId],
        slots: &mut [Option<PeerBody>],
    ) -> Option<PeerMessage> {
        if msg.tick != tick || msg.body.phase() != phase {
            return Some(msg);
        }
        match from.iter().position(|w| *w == msg.from) {
            Some(i) if slots[i].is_none() => {
                slots[i] = Some(msg.body);
                None
            }
            _ => Some(msg),
        }
    }
}

// ── Worker ↔ coordinator ───────────────────────────────────────────

/// Instruction from the coordinator, sent after every reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Directive {
    /// Run the given tick.
    Step(TickId),
    /// Finalise: gather on the root worker, then exit.
    Terminate,
    /// Exit immediately.
    Abort,
}

/// One worker's contribution to a reduction.
#[derive(Debug)]
pub(crate) struct WorkerReport {
    pub worker: WorkerId,
    pub tick: TickId,
    pub satisfied: u64,
    pub total: u64,
    pub owned: Vec<AgentId>,
    pub rows: Vec<AgentRow>,
    pub metrics: TickMetrics,
}

#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Report(WorkerReport),
    Gathered {
        snapshot: GlobalSnapshot,
        metric: MoranI,
    },
    Failed {
        worker: WorkerId,
        error: EngineError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_reorders_and_stashes_early_messages() {
        let mut boxes = Mailbox::mesh(3, Duration::from_secs(5));
        let (w2, rest) = boxes.split_last_mut().unwrap();
        let (w0, w1) = rest.split_at_mut(1);
        let (w0, w1) = (&mut w0[0], &w1[0]);

        w1.send(WorkerId(0), TickId(1), PeerBody::Acks(vec![])).unwrap();
        w2.send(WorkerId(0), TickId(1), PeerBody::Migrants(vec![])).unwrap();
        w1.send(WorkerId(0), TickId(1), PeerBody::Migrants(vec![])).unwrap();

        let got = w0
            .collect(TickId(1), Phase::Migrants, &[WorkerId(1), WorkerId(2)])
            .unwrap();
        let from: Vec<WorkerId> = got.iter().map(|(w, _)| *w).collect();
        assert_eq!(from, vec![WorkerId(1), WorkerId(2)]);

        let acks = w0.collect(TickId(1), Phase::Acks, &[WorkerId(1)]).unwrap();
        assert!(matches!(acks[0].1, PeerBody::Acks(_)));
    }

    #[test]
    fn collect_waits_for_a_slow_peer_that_keeps_sending() {
        let mut boxes = Mailbox::mesh(3, Duration::from_millis(300));
        let w2 = boxes.pop().unwrap();
        let w1 = boxes.pop().unwrap();
        let mut w0 = boxes.pop().unwrap();

        let senders = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            w1.send(WorkerId(0), TickId(3), PeerBody::Acks(vec![])).unwrap();
            std::thread::sleep(Duration::from_millis(200));
            w2.send(WorkerId(0), TickId(3), PeerBody::Acks(vec![])).unwrap();
        });

        let got = w0
            .collect(TickId(3), Phase::Acks, &[WorkerId(1), WorkerId(2)])
            .unwrap();
        assert_eq!(got.len(), 2);
        senders.join().unwrap();
    }

    #[test]
    fn collect_times_out_naming_the_silent_peer() {
        let mut boxes = Mailbox::mesh(2, Duration::from_millis(20));
        let err = boxes[0]
            .collect(TickId(0), Phase::Ghosts, &[WorkerId(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::WorkerLost {
                worker: Some(WorkerId(1)),
                ..
            }
        ));
    }
}
