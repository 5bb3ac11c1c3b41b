//! Benchmark result accounting and summary formatting

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub label: String,
    pub elapsed: Duration,
    pub processed: u64,
    pub rollbacks: u64,
    /// `None` where stealing does not apply (the sequential baseline).
    pub steals: Option<usize>,
}

impl BenchmarkResult {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// Processed commands per second; zero for a run too short to time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    /// How many times faster this run was than `baseline`.
    pub fn speedup_over(&self, baseline: &BenchmarkResult) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            baseline.elapsed.as_secs_f64() / secs
        } else {
            0.0
        }
    }

    /// One row of the summary table.
    pub fn summary_row(&self, baseline: &BenchmarkResult) -> String {
        let steals = match self.steals {
            Some(steals) => steals.to_string(),
            None => "N/A".to_string(),
        };
        format!(
            "  {:<16}| {:>9.2} | {:>6.2}x | {:>6}",
            self.label,
            self.elapsed_ms(),
            self.speedup_over(baseline),
            steals
        )
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Time:        {:.2} ms", self.elapsed_ms())?;
        writeln!(f, "  Processed:   {} inputs", self.processed)?;
        writeln!(f, "  Rollbacks:   {}", self.rollbacks)?;
        if let Some(steals) = self.steals {
            writeln!(f, "  Work Steals: {}", steals)?;
        }
        write!(f, "  Throughput:  {:.2} inputs/sec", self.throughput())
    }
}
