//! Error types surfaced by the server, the matches it owns, and the worker pool.

use thiserror::Error;

/// Errors returned when routing or applying commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    #[error("match {match_id} is out of range (server owns {match_count} matches)")]
    UnknownMatch { match_id: u32, match_count: usize },

    #[error("match {0} has not been started")]
    MatchNotRunning(u32),
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("steal rounds must be at least 1")]
    ZeroStealRounds,

    #[error("idle timeout must be non-zero")]
    ZeroIdleTimeout,

    #[error("snapshot interval must be at least 1 tick")]
    ZeroSnapshotInterval,

    #[error("snapshot capacity must be at least 1")]
    ZeroSnapshotCapacity,
}

/// A task that panicked while running on a worker.
///
/// Delivered on the pool's failure channel; the worker that caught it keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task panicked on worker {worker_id}: {message}")]
pub struct TaskFailure {
    pub worker_id: usize,
    pub message: String,
}
