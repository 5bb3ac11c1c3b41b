//! Tunables for matches and the worker pool.
//!
//! Defaults mirror the reference workload: snapshots every 5 ticks, 10 retained,
//! a forced resimulation two ticks deep after every snapshot, and a 100µs idle
//! wait for workers that find nothing to run.

use crate::error::ConfigError;
use std::time::Duration;

/// Synthetic resimulation run right after each periodic snapshot.
///
/// This exercises the rollback path even when no late input arrives. It has no
/// effect on the simulated outcome for in-order input, only on cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedRollback {
    Disabled,
    /// Resimulate from the anchor for `current_tick - lookback` (floored at 0).
    Periodic { lookback: u32 },
}

impl Default for ForcedRollback {
    fn default() -> Self {
        ForcedRollback::Periodic { lookback: 2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchConfig {
    /// A snapshot is taken whenever the tick counter reaches a multiple of this.
    pub snapshot_interval: u32,
    /// Retained snapshots; the oldest is evicted when exceeded.
    pub snapshot_capacity: usize,
    pub forced_rollback: ForcedRollback,
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_interval == 0 {
            return Err(ConfigError::ZeroSnapshotInterval);
        }
        if self.snapshot_capacity == 0 {
            return Err(ConfigError::ZeroSnapshotCapacity);
        }
        Ok(())
    }

    pub fn without_forced_rollback(self) -> Self {
        Self {
            forced_rollback: ForcedRollback::Disabled,
            ..self
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 5,
            snapshot_capacity: 10,
            forced_rollback: ForcedRollback::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads, each owning one queue.
    pub workers: usize,

    /// Victims probed per miss, as a multiple of `workers`.
    pub steal_rounds: usize,

    /// Upper bound on an idle worker's wait before it probes again.
    ///
    /// Bounds both busy-spinning and the cost of a missed wakeup.
    pub idle_timeout: Duration,

    /// Seed for victim selection; each worker mixes in its own id.
    pub seed: u64,
}

impl PoolConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.steal_rounds == 0 {
            return Err(ConfigError::ZeroStealRounds);
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::ZeroIdleTimeout);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            steal_rounds: 2,
            idle_timeout: Duration::from_micros(100),
            seed: 0x853c49e6748fea9b,
        }
    }
}
