//! Performance benchmarks for the scheduler and match simulation

use assert_approx_eq::assert_approx_eq;
use client::bench::{run_parallel, run_sequential, run_streaming_mode, BenchSettings};
use client::generator::ClientRoster;
use server::{Match, MatchConfig, ThreadPool, WorkStealingQueue};
use shared::{Action, Command};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Benchmarks owner push/pop on an uncontended queue
#[test]
fn benchmark_queue_push_pop() {
    let queue = WorkStealingQueue::new();
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        queue.push_back(i);
        let _ = queue.try_pop_back();
    }

    let duration = start.elapsed();
    println!(
        "Queue push/pop: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(queue.is_empty());
    assert!(duration.as_millis() < 1_000);
}

/// Benchmarks submit-to-completion for many tiny tasks
#[test]
fn benchmark_task_throughput() {
    let pool = ThreadPool::new(4);
    let counter = Arc::new(AtomicUsize::new(0));
    let tasks = 50_000;
    let start = Instant::now();

    for _ in 0..tasks {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    pool.wait_all();

    let duration = start.elapsed();
    println!(
        "Task throughput: {} tasks in {:?} ({} steals)",
        tasks,
        duration,
        pool.steal_count()
    );

    assert_eq!(counter.load(Ordering::Relaxed), tasks);
    assert!(duration.as_secs() < 10);
}

/// Benchmarks in-order command processing on a single match
#[test]
fn benchmark_in_order_commands() {
    let game = Match::with_config(0, MatchConfig::default().without_forced_rollback()).unwrap();
    game.start();
    let iterations = 20_000u32;
    let start = Instant::now();

    for tick in 0..iterations {
        let action = Action::ALL[(tick % 4) as usize];
        game.process_command(&Command::new(0, 0, tick, action)).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "In-order commands: {} in {:?} ({:.2} μs/cmd)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(game.rollback_count(), 0);
    assert!(duration.as_secs() < 5);
}

/// Benchmarks late commands, each forcing a resimulation
#[test]
fn benchmark_rollback_cost() {
    let commands = ClientRoster::new(2, 1, 2_000).all_commands();
    let game = Match::new(0);
    game.start();
    let start = Instant::now();

    for command in &commands {
        game.process_command(command).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Rollback-heavy stream: {} commands, {} rollbacks in {:?}",
        commands.len(),
        game.rollback_count(),
        duration
    );

    assert!(game.rollback_count() >= 2_000);
    assert!(duration.as_secs() < 10);
}

/// Full benchmark pass at reduced scale
#[test]
fn benchmark_full_pipeline() {
    let settings = BenchSettings {
        matches: 8,
        ..BenchSettings::default()
    };
    let commands = ClientRoster::new(16, 8, 1_000).all_commands();

    let baseline = run_sequential(&commands, &settings).unwrap();
    let parallel = run_parallel(&commands, 4, &settings).unwrap();
    let streaming = run_streaming_mode(ClientRoster::new(16, 8, 1_000), 4, &settings).unwrap();

    for result in [&baseline, &parallel, &streaming] {
        println!("{}\n{}", result.label, result);
    }
    println!("Parallel speedup: {:.2}x", parallel.speedup_over(&baseline));

    assert_eq!(baseline.processed, 16_000);
    assert_eq!(parallel.processed, 16_000);
    assert_eq!(streaming.processed, 16_000);
    assert!(baseline.throughput() > 0.0);
    assert_approx_eq!(baseline.speedup_over(&baseline), 1.0);
    assert!(parallel.elapsed.as_secs() < 30);
}
