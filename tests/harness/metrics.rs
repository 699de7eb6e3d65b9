// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome collection for abuse simulation results.

use community_guard::error::Denial;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Collects outcomes during a simulation.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    outcomes: HashMap<Outcome, usize>,
    allowed_per_caller: HashMap<String, usize>,
    /// Latency samples (microseconds)
    latencies: Vec<u64>,
}

/// Possible outcomes for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Allowed,
    AuthenticationRequired,
    AuthorizationDenied,
    RateLimited,
    InvalidEndpoint,
    AutomatedCallerRejected,
}

impl Outcome {
    pub fn of<T>(result: &Result<T, Denial>) -> Self {
        match result {
            Ok(_) => Outcome::Allowed,
            Err(Denial::AuthenticationRequired) => Outcome::AuthenticationRequired,
            Err(Denial::AuthorizationDenied) => Outcome::AuthorizationDenied,
            Err(Denial::RateLimitExceeded { .. }) => Outcome::RateLimited,
            Err(Denial::InvalidEndpoint(_)) => Outcome::InvalidEndpoint,
            Err(Denial::AutomatedCallerRejected) => Outcome::AutomatedCallerRejected,
        }
    }
}

impl AttackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Record a request outcome.
    pub fn record(&mut self, outcome: Outcome, caller: &str, latency: Duration) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        if outcome == Outcome::Allowed {
            *self.allowed_per_caller.entry(caller.to_string()).or_insert(0) += 1;
        }
        self.latencies.push(latency.as_micros() as u64);
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Admitted requests for one caller.
    pub fn allowed_for(&self, caller: &str) -> usize {
        self.allowed_per_caller.get(caller).copied().unwrap_or(0)
    }

    /// Largest number of admissions any single caller got.
    pub fn max_allowed_per_caller(&self) -> usize {
        self.allowed_per_caller.values().copied().max().unwrap_or(0)
    }

    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        (total - self.count(Outcome::Allowed)) as f64 / total as f64
    }

    fn sorted_latencies(&self) -> Vec<u64> {
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        sorted
    }

    pub fn median_latency_us(&self) -> u64 {
        let sorted = self.sorted_latencies();
        sorted.get(sorted.len() / 2).copied().unwrap_or(0)
    }

    pub fn p99_latency_us(&self) -> u64 {
        let sorted = self.sorted_latencies();
        if sorted.is_empty() {
            return 0;
        }
        let idx = (sorted.len() as f64 * 0.99) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    /// Generate a summary report.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total_requests: self.total_requests(),
            allowed: self.count(Outcome::Allowed),
            rate_limited: self.count(Outcome::RateLimited),
            rejected: self.count(Outcome::AuthenticationRequired)
                + self.count(Outcome::AuthorizationDenied)
                + self.count(Outcome::InvalidEndpoint)
                + self.count(Outcome::AutomatedCallerRejected),
            duration_ms: self.duration().as_millis() as u64,
            block_rate: self.block_rate(),
            median_latency_us: self.median_latency_us(),
            p99_latency_us: self.p99_latency_us(),
            admitted_callers: self.allowed_per_caller.len(),
        }
    }
}

/// Summary of a simulation.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total_requests: usize,
    pub allowed: usize,
    pub rate_limited: usize,
    pub rejected: usize,
    pub duration_ms: u64,
    pub block_rate: f64,
    pub median_latency_us: u64,
    pub p99_latency_us: u64,
    pub admitted_callers: usize,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Abuse Simulation Report ===")?;
        writeln!(f, "Duration:          {} ms", self.duration_ms)?;
        writeln!(f, "Total Requests:    {}", self.total_requests)?;
        writeln!(f)?;
        writeln!(f, "--- Outcomes ---")?;
        writeln!(f, "Allowed:           {}", self.allowed)?;
        writeln!(f, "Rate Limited:      {}", self.rate_limited)?;
        writeln!(f, "Rejected:          {}", self.rejected)?;
        writeln!(f, "Block Rate:        {:.1}%", self.block_rate * 100.0)?;
        writeln!(f, "Admitted Callers:  {}", self.admitted_callers)?;
        writeln!(f)?;
        writeln!(f, "--- Latency ---")?;
        writeln!(f, "Median:            {} us", self.median_latency_us)?;
        writeln!(f, "P99:               {} us", self.p99_latency_us)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        let mut metrics = AttackMetrics::new();
        metrics.start();
        metrics.record(Outcome::Allowed, "10.0.0.1", Duration::from_micros(100));
        metrics.record(Outcome::Allowed, "10.0.0.2", Duration::from_micros(150));
        metrics.record(Outcome::Allowed, "10.0.0.2", Duration::from_micros(120));
        metrics.record(Outcome::RateLimited, "10.0.0.2", Duration::from_micros(50));
        metrics.finish();

        assert_eq!(metrics.total_requests(), 4);
        assert_eq!(metrics.count(Outcome::Allowed), 3);
        assert_eq!(metrics.allowed_for("10.0.0.2"), 2);
        assert_eq!(metrics.max_allowed_per_caller(), 2);
        assert!((metrics.block_rate() - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_outcome_of_denial() {
        let denied: Result<(), Denial> = Err(Denial::AuthorizationDenied);
        assert_eq!(Outcome::of(&denied), Outcome::AuthorizationDenied);
        assert_eq!(Outcome::of(&Ok::<_, Denial>(())), Outcome::Allowed);
    }
}
