//! Rollback-capable match simulation
//!
//! A `Match` owns one `MatchState`, a short ring of snapshots and the log of every
//! command it has accepted. One mutex guards all three as a unit, so every
//! operation on a match is fully serialized. Matches never lock each other.
//!
//! Commands advance the match by exactly one tick each. A command stamped with a
//! tick the match has already passed is *late*: the match restores the newest
//! snapshot at or before that tick and replays the log from there, which both
//! repairs the divergence and fast-forwards back to the live tick. The live tick
//! itself never moves backwards.

use crate::config::{ForcedRollback, MatchConfig};
use crate::error::{ConfigError, ServerError};
use log::debug;
use parking_lot::Mutex;
use shared::{apply_command, Command, MatchState, Snapshot};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// What `Match::process_command` did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Applied directly to the live state.
    Applied,
    /// Arrived late and forced a resimulation from the snapshot at `anchor_tick`.
    RolledBack { anchor_tick: u32 },
}

struct MatchInner {
    state: MatchState,
    /// Ascending by tick.
    snapshots: VecDeque<Snapshot>,
    /// Arrival order. Late commands land after newer-tick ones.
    log: Vec<Command>,
}

impl MatchInner {
    /// Captures the state at the live tick.
    ///
    /// A snapshot at tick `t` holds exactly the logged commands stamped before `t`.
    /// If a command stamped at or past `t` has already been applied, the live state
    /// is ahead of that and the snapshot is rebuilt from the previous one instead.
    fn take_snapshot(&mut self, capacity: usize) {
        let tick = self.state.current_tick;
        let snapshot = match self.snapshots.back() {
            Some(previous) if self.log.iter().any(|command| command.tick >= tick) => {
                let mut state = previous.state.clone();
                for command in self
                    .log
                    .iter()
                    .filter(|command| command.tick >= previous.tick && command.tick < tick)
                {
                    apply_command(&mut state, command);
                }
                state.current_tick = tick;
                state.running = self.state.running;
                Snapshot { tick, state }
            }
            _ => Snapshot::capture(&self.state),
        };
        self.snapshots.push_back(snapshot);

        if self.snapshots.len() > capacity {
            self.snapshots.pop_front();

            // No rollback can anchor before the oldest retained snapshot.
            if let Some(oldest) = self.snapshots.front().map(|snapshot| snapshot.tick) {
                let before = self.log.len();
                self.log.retain(|command| command.tick >= oldest);
                debug!(
                    "Match {}: evicted snapshot, pruned {} commands older than tick {}",
                    self.state.match_id,
                    before - self.log.len(),
                    oldest
                );
            }
        }
    }

    /// Index of the newest snapshot at or before `tick`, falling back to the oldest.
    fn anchor_index(&self, tick: u32) -> Option<usize> {
        if self.snapshots.is_empty() {
            return None;
        }
        let newer = self
            .snapshots
            .partition_point(|snapshot| snapshot.tick <= tick);
        Some(newer.saturating_sub(1))
    }

    /// Restores the anchor for `tick` and replays every logged command stamped at or
    /// after it, in log order. Returns the anchor tick.
    ///
    /// With `discard_newer`, snapshots newer than the anchor are dropped when the
    /// anchor is at or before `tick`: they were captured before the command that
    /// triggered this rollback arrived. A fallback anchor newer than `tick` never
    /// replays that command, so the window is left intact.
    fn resimulate(&mut self, tick: u32, discard_newer: bool) -> Option<u32> {
        let index = self.anchor_index(tick)?;
        if discard_newer && self.snapshots[index].tick <= tick {
            self.snapshots.truncate(index + 1);
        }

        let anchor = &self.snapshots[index];
        let anchor_tick = anchor.tick;
        let live_tick = self.state.current_tick;
        let running = self.state.running;

        let mut restored = anchor.state.clone();
        for command in self.log.iter().filter(|command| command.tick >= anchor_tick) {
            apply_command(&mut restored, command);
        }
        restored.current_tick = live_tick;
        restored.running = running;
        self.state = restored;

        Some(anchor_tick)
    }
}

pub struct Match {
    match_id: u32,
    config: MatchConfig,
    inner: Mutex<MatchInner>,
    rollbacks: AtomicU64,
}

impl Match {
    /// A match at the default spawn points with the default config.
    pub fn new(match_id: u32) -> Self {
        Self::build(MatchState::new(match_id), MatchConfig::default())
    }

    pub fn with_config(match_id: u32, config: MatchConfig) -> Result<Self, ConfigError> {
        Self::from_state(MatchState::new(match_id), config)
    }

    /// Creates a match that starts from `state` instead of the default spawn points.
    pub fn from_state(state: MatchState, config: MatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(state, config))
    }

    fn build(state: MatchState, config: MatchConfig) -> Self {
        Self {
            match_id: state.match_id,
            config,
            inner: Mutex::new(MatchInner {
                state,
                snapshots: VecDeque::with_capacity(config.snapshot_capacity + 1),
                log: Vec::new(),
            }),
            rollbacks: AtomicU64::new(0),
        }
    }

    /// Transitions to running and captures the first snapshot. Idempotent.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.state.running {
            return;
        }
        inner.state.running = true;
        inner.take_snapshot(self.config.snapshot_capacity);
    }

    /// Logs `command`, applies it (rolling back first if it is late) and advances one tick.
    pub fn process_command(&self, command: &Command) -> Result<CommandOutcome, ServerError> {
        let mut inner = self.inner.lock();
        if !inner.state.running {
            return Err(ServerError::MatchNotRunning(self.match_id));
        }

        inner.log.push(*command);

        let outcome = if command.tick < inner.state.current_tick {
            self.rollbacks.fetch_add(1, Ordering::Relaxed);
            match inner.resimulate(command.tick, true) {
                Some(anchor_tick) => {
                    debug!(
                        "Match {}: late {} for tick {} at tick {}, replayed from {}",
                        self.match_id,
                        command.action.name(),
                        command.tick,
                        inner.state.current_tick,
                        anchor_tick
                    );
                    CommandOutcome::RolledBack { anchor_tick }
                }
                None => {
                    // Unreachable once started: start() always leaves a snapshot.
                    apply_command(&mut inner.state, command);
                    CommandOutcome::Applied
                }
            }
        } else {
            apply_command(&mut inner.state, command);
            CommandOutcome::Applied
        };

        inner.state.current_tick += 1;

        if inner.state.current_tick % self.config.snapshot_interval == 0 {
            inner.take_snapshot(self.config.snapshot_capacity);

            if let ForcedRollback::Periodic { lookback } = self.config.forced_rollback {
                let target = inner.state.current_tick.saturating_sub(lookback);
                if inner.resimulate(target, false).is_some() {
                    self.rollbacks.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        Ok(outcome)
    }

    /// Resimulates from the anchor for `to_tick` up to the live tick.
    ///
    /// Counted as a rollback. Returns the anchor tick, or `None` if no snapshot exists yet.
    pub fn rollback(&self, to_tick: u32) -> Option<u32> {
        let mut inner = self.inner.lock();
        let anchor_tick = inner.resimulate(to_tick, false)?;
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        Some(anchor_tick)
    }

    /// Deep copy of the live state.
    pub fn state(&self) -> MatchState {
        self.inner.lock().state.clone()
    }

    pub fn current_tick(&self) -> u32 {
        self.inner.lock().state.current_tick
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().state.running
    }

    pub fn match_id(&self) -> u32 {
        self.match_id
    }

    pub fn rollback_count(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    pub fn snapshot_ticks(&self) -> Vec<u32> {
        self.inner
            .lock()
            .snapshots
            .iter()
            .map(|snapshot| snapshot.tick)
            .collect()
    }

    pub fn command_log_len(&self) -> usize {
        self.inner.lock().log.len()
    }
}
