//! Per-tick counters for the simulation engine.
//!
//! Each worker fills a [`TickMetrics`] during its tick; the coordinator
//! merges them into one value per tick.

/// Counters and timings for a single tick.
///
/// Counts are summed across workers. Durations are in microseconds and
/// hold the slowest worker's time, since the tick waits for it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Time for evaluation and relocation.
    pub step_us: u64,
    /// Time for the three exchange phases.
    pub exchange_us: u64,
    /// Unsatisfied agents that looked for a new cell.
    pub relocation_attempts: u64,
    /// Relocations inside the owning box.
    pub local_moves: u64,
    /// Agents that found no vacancy within the attempt bound.
    pub stuck: u64,
    /// Migrants sent to another worker.
    pub migrants_sent: u64,
    /// Migrants taken over by their destination owner.
    pub migrants_accepted: u64,
    /// Migrants returned to their origin cell.
    pub migrants_restored: u64,
    /// Records dropped as corrupt (migrants and ghosts).
    pub corrupt_records: u64,
    /// Ghost copies installed after the refresh.
    pub ghosts: u64,
}

impl TickMetrics {
    /// Fold another worker's metrics into this one.
    pub fn merge(&mut self, other: &TickMetrics) {
        self.step_us = self.step_us.max(other.step_us);
        self.exchange_us = self.exchange_us.max(other.exchange_us);
        self.relocation_attempts += other.relocation_attempts;
        self.local_moves += other.local_moves;
        self.stuck += other.stuck;
        self.migrants_sent += other.migrants_sent;
        self.migrants_accepted += other.migrants_accepted;
        self.migrants_restored += other.migrants_restored;
        self.corrupt_records += other.corrupt_records;
        self.ghosts += other.ghosts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = TickMetrics::default();
        assert_eq!(m.step_us, 0);
        assert_eq!(m.migrants_sent, 0);
        assert_eq!(m.ghosts, 0);
    }

    #[test]
    fn merge_sums_counts_and_keeps_slowest_time() {
        let mut a = TickMetrics {
            step_us: 10,
            exchange_us: 50,
            local_moves: 3,
            ..TickMetrics::default()
        };
        let b = TickMetrics {
            step_us: 30,
            exchange_us: 5,
            local_moves: 4,
            migrants_sent: 2,
            ..TickMetrics::default()
        };
        a.merge(&b);
        assert_eq!(a.step_us, 30);
        assert_eq!(a.exchange_us, 50);
        assert_eq!(a.local_moves, 7);
        assert_eq!(a.migrants_sent, 2);
    }
}
