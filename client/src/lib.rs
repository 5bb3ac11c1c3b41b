//! # Benchmark Client Library
//!
//! This library plays the part of the players: it generates deterministic input
//! streams for a fleet of simulated clients and drives the server library through
//! sequential, batch-parallel and streaming runs, reporting time, throughput,
//! rollbacks and work steals for each.
//!
//! ## Module Organization
//!
//! ### Generator Module (`generator`)
//! Simulated clients and the roster that pairs them into matches:
//! - One command per tick with a uniformly random action
//! - Per-client seeding for reproducible runs
//! - Batch-at-a-time generation for streaming producers
//!
//! ### Bench Module (`bench`)
//! One function per run mode, each on a fresh server and pool.
//!
//! ### Report Module (`report`)
//! Benchmark results, derived figures and the summary table.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::bench::{run_parallel, run_sequential, BenchSettings};
//! use client::generator::ClientRoster;
//!
//! let commands = ClientRoster::new(40, 20, 10_000).all_commands();
//! let settings = BenchSettings::default();
//!
//! let baseline = run_sequential(&commands, &settings).unwrap();
//! let parallel = run_parallel(&commands, 4, &settings).unwrap();
//! println!("{:.2}x", parallel.speedup_over(&baseline));
//! ```

pub mod bench;
pub mod generator;
pub mod report;
