//! # Rollback Arena Server Library
//!
//! This library hosts many small, independent two-entity matches and simulates
//! them concurrently on a work-stealing thread pool. Every match is authoritative
//! over its own state and reconciles late commands by rolling back to a snapshot
//! and replaying its command log.
//!
//! ## Core Responsibilities
//!
//! ### Match Simulation
//! A match advances one tick per accepted command. Commands stamped with a tick
//! the match has already passed are late: the match restores the newest snapshot
//! at or before that tick and replays every logged command from there, so the
//! final state reflects the late input without rewinding the live tick counter.
//!
//! ### Command Routing
//! The game server owns one pending queue per match. Producers push commands
//! under the queue lock only; draining swaps the queue out and simulates outside
//! it. Commands for unknown matches are dropped and counted.
//!
//! ### Parallel Scheduling
//! Drain work is handed to the pool one task per match, either round-robin or
//! pinned to a worker by match id. Idle workers steal the oldest task from a
//! random sibling, so a pinned backlog still spreads across the pool.
//!
//! ## Architecture Design
//!
//! ### Locking
//! Each match keeps state, snapshots and log under a single mutex. No code path
//! holds two match locks at once, and a queue lock is never held while a match
//! lock is taken, so the server cannot deadlock on its own locks.
//!
//! ### Cooperative Continuations
//! Long-running work (streaming producers, match drainers) runs as
//! continuations: each step does a bounded slice of work and then yields. A
//! yielded unit is requeued behind the work already waiting, which keeps even a
//! single-worker pool making progress.
//!
//! ### Failure Isolation
//! A panicking task is caught by the worker that ran it. The failure is counted,
//! logged and delivered on a channel; the worker keeps serving its queue.
//!
//! ## Module Organization
//!
//! ### Work Queue Module (`work_queue`)
//! Per-worker double-ended queue: LIFO for the owner, FIFO for thieves.
//!
//! ### Thread Pool Module (`thread_pool`)
//! Workers, stealing, idle parking, the completion barrier and failure reporting.
//!
//! ### Game Module (`game`)
//! The match: snapshots, command log, rollback and replay.
//!
//! ### Game Server Module (`game_server`)
//! Match ownership, command routing and batch scheduling.
//!
//! ### Tasks Module (`tasks`)
//! Continuations and the streaming pipeline.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{GameServer, ThreadPool};
//! use shared::{Action, Command};
//! use std::sync::Arc;
//!
//! let server = Arc::new(GameServer::new(4));
//! server.start();
//!
//! for tick in 0..100 {
//!     server.receive_command(Command::new(tick % 4, 0, tick, Action::MoveUp)).ok();
//! }
//!
//! let pool = ThreadPool::new(4);
//! server.process_all_parallel(&pool);
//! assert!(server.is_all_processed());
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod game_server;
pub mod tasks;
pub mod thread_pool;
pub mod work_queue;

pub use config::{ForcedRollback, MatchConfig, PoolConfig};
pub use error::{ConfigError, ServerError, TaskFailure};
pub use game::{CommandOutcome, Match};
pub use game_server::GameServer;
pub use tasks::{run_streaming, Continuation, Placement, Step};
pub use thread_pool::{PoolHandle, ThreadPool};
pub use work_queue::WorkStealingQueue;
