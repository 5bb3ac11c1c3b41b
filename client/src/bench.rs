//! Benchmark runs: sequential baseline, batch-parallel and streaming
//!
//! Every run builds a fresh server, so results are independent of each other.
//! Only processing is timed for the batch modes; the streaming mode times the
//! whole pipeline since generation and processing overlap there.

use crate::generator::ClientRoster;
use crate::report::BenchmarkResult;
use log::{info, warn};
use server::{run_streaming, ConfigError, GameServer, MatchConfig, Placement, ThreadPool};
use shared::Command;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct BenchSettings {
    pub matches: usize,
    pub match_config: MatchConfig,
    pub placement: Placement,
    pub batch_size: usize,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            matches: 20,
            match_config: MatchConfig::default(),
            placement: Placement::RoundRobin,
            batch_size: 50,
        }
    }
}

impl BenchSettings {
    fn server(&self) -> Result<GameServer, ConfigError> {
        let server = GameServer::with_config(self.matches, self.match_config)?;
        server.start();
        Ok(server)
    }
}

pub fn run_sequential(
    commands: &[Command],
    settings: &BenchSettings,
) -> Result<BenchmarkResult, ConfigError> {
    let server = settings.server()?;
    server.receive_commands(commands.iter().copied());

    let start = Instant::now();
    server.process_all_sequential();
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        label: "Sequential".to_string(),
        elapsed,
        processed: server.processed_count(),
        rollbacks: server.total_rollback_count(),
        steals: None,
    })
}

pub fn run_parallel(
    commands: &[Command],
    threads: usize,
    settings: &BenchSettings,
) -> Result<BenchmarkResult, ConfigError> {
    let server = Arc::new(settings.server()?);
    server.receive_commands(commands.iter().copied());
    let pool = ThreadPool::new(threads);

    let start = Instant::now();
    server.process_all_parallel_with(&pool, settings.placement);
    let elapsed = start.elapsed();

    report_failures(&pool);
    Ok(BenchmarkResult {
        label: format!("Parallel ({:>2}T)", pool.num_workers()),
        elapsed,
        processed: server.processed_count(),
        rollbacks: server.total_rollback_count(),
        steals: Some(pool.steal_count()),
    })
}

/// Producers and match drainers run concurrently on the same pool.
pub fn run_streaming_mode(
    roster: ClientRoster,
    threads: usize,
    settings: &BenchSettings,
) -> Result<BenchmarkResult, ConfigError> {
    let server = Arc::new(settings.server()?);
    let pool = ThreadPool::new(threads);

    let start = Instant::now();
    run_streaming(
        &server,
        &pool,
        roster.into_clients(),
        settings.batch_size,
        settings.placement,
    );
    let elapsed = start.elapsed();

    report_failures(&pool);
    Ok(BenchmarkResult {
        label: format!("Streaming ({:>2}T)", pool.num_workers()),
        elapsed,
        processed: server.processed_count(),
        rollbacks: server.total_rollback_count(),
        steals: Some(pool.steal_count()),
    })
}

fn report_failures(pool: &ThreadPool) {
    let failures = pool.failure_count();
    if failures > 0 {
        warn!("{} tasks failed during the run", failures);
        for failure in pool.failures().try_iter() {
            info!("  {}", failure);
        }
    }
}

/// Default thread counts: 2 and 4, plus half and all hardware threads on larger
/// machines.
pub fn default_thread_counts() -> Vec<usize> {
    let hardware = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut counts = vec![2, 4];
    if hardware > 4 {
        counts.push(hardware / 2);
        counts.push(hardware);
    }
    counts.dedup();
    counts
}
