use clap::Parser;
use client::bench::{self, BenchSettings};
use client::generator::ClientRoster;
use client::report::BenchmarkResult;
use log::info;
use server::{ForcedRollback, MatchConfig, Placement, PoolConfig};
use shared::{ARENA_HEIGHT, ARENA_WIDTH};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of concurrent matches
    #[arg(short = 'm', long, default_value = "20")]
    matches: usize,

    /// Number of simulated clients (two per match)
    #[arg(short = 'c', long, default_value = "40")]
    clients: usize,

    /// Commands generated by each client
    #[arg(short = 'i', long, default_value = "10000")]
    inputs_per_client: u32,

    /// Commands a streaming producer pushes per step
    #[arg(short = 'b', long, default_value = "50")]
    batch_size: usize,

    /// Worker counts to benchmark; defaults to 2, 4 and the hardware thread counts
    #[arg(short = 't', long, value_delimiter = ',')]
    threads: Vec<usize>,

    /// Also run producers and matches concurrently on the pool
    #[arg(long)]
    streaming: bool,

    /// Pin match i to worker i mod N instead of round-robin submission
    #[arg(long)]
    pin: bool,

    /// Disable the periodic synthetic rollback
    #[arg(long)]
    no_forced_rollback: bool,
}

fn separator() {
    println!("{}", "=".repeat(50));
}

fn heading(title: &str) {
    separator();
    println!("  {}", title);
    separator();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut match_config = MatchConfig::default();
    if args.no_forced_rollback {
        match_config = match_config.without_forced_rollback();
    }
    match_config.validate()?;

    let threads = if args.threads.is_empty() {
        bench::default_thread_counts()
    } else {
        args.threads.clone()
    };
    for &workers in &threads {
        PoolConfig::with_workers(workers).validate()?;
    }

    let settings = BenchSettings {
        matches: args.matches.max(1),
        match_config,
        placement: if args.pin {
            Placement::Pinned
        } else {
            Placement::RoundRobin
        },
        batch_size: args.batch_size.max(1),
    };

    heading("GAME SERVER SIMULATION - WORK STEALING DEMO");
    println!("\n[Configuration]");
    println!("  Matches:          {}", settings.matches);
    println!("  Clients:          {}", args.clients);
    println!("  Inputs/Client:    {}", args.inputs_per_client);
    println!(
        "  Total Inputs:     {}",
        args.clients as u64 * args.inputs_per_client as u64
    );
    println!("  Arena Size:       {}x{}", ARENA_WIDTH, ARENA_HEIGHT);
    match match_config.forced_rollback {
        ForcedRollback::Periodic { lookback } => println!(
            "  Rollback Every:   {} ticks (lookback {})",
            match_config.snapshot_interval, lookback
        ),
        ForcedRollback::Disabled => println!("  Rollback Every:   disabled"),
    }
    println!("  Placement:        {:?}", settings.placement);

    println!("\n[Generating Inputs]");
    let gen_start = Instant::now();
    let roster = ClientRoster::new(args.clients, settings.matches, args.inputs_per_client);
    let commands = roster.all_commands();
    println!(
        "  Generated {} inputs in {:.2} ms",
        commands.len(),
        gen_start.elapsed().as_secs_f64() * 1000.0
    );

    heading("SEQUENTIAL MODE");
    let baseline = bench::run_sequential(&commands, &settings)?;
    println!("{}", baseline);

    let mut results: Vec<BenchmarkResult> = Vec::new();
    for &workers in &threads {
        heading(&format!("PARALLEL MODE ({} threads)", workers));
        let result = bench::run_parallel(&commands, workers, &settings)?;
        println!("{}", result);
        println!("  Speedup:     {:.2}x", result.speedup_over(&baseline));
        results.push(result);

        if args.streaming {
            heading(&format!("STREAMING MODE ({} threads)", workers));
            let roster = ClientRoster::new(args.clients, settings.matches, args.inputs_per_client);
            let result = bench::run_streaming_mode(roster, workers, &settings)?;
            println!("{}", result);
            results.push(result);
        }
    }

    heading("SUMMARY");
    println!("\n  Mode            | Time (ms) | Speedup | Steals");
    println!("  ----------------|-----------|---------|-------");
    println!("{}", baseline.summary_row(&baseline));
    for result in &results {
        println!("{}", result.summary_row(&baseline));
    }
    println!();

    info!("Benchmark complete: {} runs", results.len() + 1);
    Ok(())
}
