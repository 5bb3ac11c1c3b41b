//! Command routing and match scheduling
//!
//! The server owns a fixed set of matches, each paired with its own pending
//! command queue. Ingress only ever touches a queue lock; simulation only ever
//! touches one match lock at a time. Draining a queue swaps the whole pending
//! list out under its lock and then simulates without holding it, so producers
//! are never blocked behind in-flight simulation.

use crate::config::MatchConfig;
use crate::error::{ConfigError, ServerError};
use crate::game::Match;
use crate::tasks::Placement;
use crate::thread_pool::ThreadPool;
use log::{info, warn};
use parking_lot::Mutex;
use shared::{Command, MatchState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct MatchSlot {
    game: Match,
    pending: Mutex<Vec<Command>>,
}

pub struct GameServer {
    slots: Vec<MatchSlot>,
    processed: AtomicU64,
    rejected: AtomicU64,
}

impl GameServer {
    pub fn new(match_count: usize) -> Self {
        Self::from_matches((0..match_count).map(|match_id| Match::new(match_id as u32)))
    }

    pub fn with_config(match_count: usize, config: MatchConfig) -> Result<Self, ConfigError> {
        let games = (0..match_count)
            .map(|match_id| Match::with_config(match_id as u32, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_matches(games))
    }

    fn from_matches<I>(games: I) -> Self
    where
        I: IntoIterator<Item = Match>,
    {
        let slots = games
            .into_iter()
            .map(|game| MatchSlot {
                game,
                pending: Mutex::new(Vec::new()),
            })
            .collect();

        Self {
            slots,
            processed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Starts every match.
    pub fn start(&self) {
        for slot in &self.slots {
            slot.game.start();
        }
        info!("Game server started with {} matches", self.slots.len());
    }

    fn slot(&self, match_id: u32) -> Result<&MatchSlot, ServerError> {
        self.slots
            .get(match_id as usize)
            .ok_or(ServerError::UnknownMatch {
                match_id,
                match_count: self.slots.len(),
            })
    }

    /// Queues `command` for its match.
    ///
    /// An out-of-range match id drops the command and bumps the rejection counter.
    pub fn receive_command(&self, command: Command) -> Result<(), ServerError> {
        match self.slot(command.match_id) {
            Ok(slot) => {
                slot.pending.lock().push(command);
                Ok(())
            }
            Err(err) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping command: {}", err);
                Err(err)
            }
        }
    }

    /// Queues a batch, returning how many commands were accepted.
    pub fn receive_commands<I>(&self, commands: I) -> usize
    where
        I: IntoIterator<Item = Command>,
    {
        commands
            .into_iter()
            .filter(|command| self.receive_command(*command).is_ok())
            .count()
    }

    /// Simulates everything currently queued for `match_id`, returning how many
    /// commands were processed. New arrivals during the call wait for the next one.
    pub fn process_pending(&self, match_id: u32) -> usize {
        let Ok(slot) = self.slot(match_id) else {
            return 0;
        };

        let batch = std::mem::take(&mut *slot.pending.lock());
        let mut processed = 0;
        for command in &batch {
            match slot.game.process_command(command) {
                Ok(_) => processed += 1,
                Err(err) => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!("Rejected command for tick {}: {}", command.tick, err);
                }
            }
        }

        self.processed.fetch_add(processed as u64, Ordering::Relaxed);
        processed
    }

    /// Drains `match_id` until its queue is observed empty.
    pub fn drain(&self, match_id: u32) -> usize {
        let mut total = 0;
        while self.pending_for(match_id) > 0 {
            total += self.process_pending(match_id);
        }
        total
    }

    /// Single-threaded baseline: drains every match on the calling thread until no
    /// match reports pending work.
    pub fn process_all_sequential(&self) {
        loop {
            let mut drained_any = false;
            for match_id in 0..self.slots.len() as u32 {
                if self.pending_for(match_id) > 0 {
                    self.process_pending(match_id);
                    drained_any = true;
                }
            }
            if !drained_any {
                break;
            }
        }
    }

    /// Submits one drain task per match and blocks on the pool's completion barrier.
    pub fn process_all_parallel(self: &Arc<Self>, pool: &ThreadPool) {
        self.process_all_parallel_with(pool, Placement::RoundRobin);
    }

    pub fn process_all_parallel_with(self: &Arc<Self>, pool: &ThreadPool, placement: Placement) {
        let handle = pool.handle();
        for match_id in 0..self.slots.len() as u32 {
            let server = Arc::clone(self);
            let task = move || {
                server.drain(match_id);
            };
            match placement.worker_for(match_id, pool.num_workers()) {
                Some(worker_id) => handle.submit_to(worker_id, task),
                None => handle.submit(task),
            };
        }
        pool.wait_all();
    }

    pub fn match_count(&self) -> usize {
        self.slots.len()
    }

    /// Deep copy of a match's live state.
    pub fn match_state(&self, match_id: u32) -> Option<MatchState> {
        self.slot(match_id).ok().map(|slot| slot.game.state())
    }

    pub fn game(&self, match_id: u32) -> Option<&Match> {
        self.slot(match_id).ok().map(|slot| &slot.game)
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Sum of every match's rollback counter, read one match at a time.
    pub fn total_rollback_count(&self) -> u64 {
        self.slots
            .iter()
            .map(|slot| slot.game.rollback_count())
            .sum()
    }

    pub fn pending_for(&self, match_id: u32) -> usize {
        self.slot(match_id)
            .map(|slot| slot.pending.lock().len())
            .unwrap_or(0)
    }

    pub fn pending_count(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.pending.lock().len())
            .sum()
    }

    pub fn is_all_processed(&self) -> bool {
        self.pending_count() == 0
    }

    /// Drops every queued command and resets the processed counter.
    pub fn clear_inputs(&self) {
        for slot in &self.slots {
            slot.pending.lock().clear();
        }
        self.processed.store(0, Ordering::Relaxed);
    }
}
