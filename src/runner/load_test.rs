//! Concurrent load driver
//!
//! Creates a set of users, then submits `users * transactions_per_user`
//! transactions with at most `concurrency` in flight, each on its own tokio
//! task. The workload is deterministic apart from the generated IDs:
//!
//! - operation `i` belongs to user `i % users`
//! - every third operation of a user is a withdrawal, the rest are deposits
//! - the amount is `10 + (i % 90)` whole units
//!
//! After the run every final balance is checked against the sum of the
//! accepted deltas for that user (conservation), and must be non-negative.

use crate::config::LoadTestConfig;
use crate::core::LedgerEngine;
use crate::store::LedgerStore;
use crate::types::{LedgerError, NewUser, TransactionRequest, TransactionType, UserId};
use anyhow::Context;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub insufficient_funds: usize,
    pub duplicates: usize,
    pub timeouts: usize,
    pub other_errors: usize,
}

impl OutcomeCounts {
    fn record(&mut self, result: &Result<(), LedgerError>) {
        match result {
            Ok(()) => self.succeeded += 1,
            Err(LedgerError::InsufficientFunds { .. }) => self.insufficient_funds += 1,
            Err(LedgerError::DuplicateTransaction { .. }) => self.duplicates += 1,
            Err(LedgerError::Timeout { .. }) => self.timeouts += 1,
            Err(_) => self.other_errors += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.insufficient_funds + self.duplicates + self.timeouts + self.other_errors
    }
}

/// Latency distribution of individual `create_transaction` calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyStats {
    pub min: Duration,
    pub mean: Duration,
    pub p95: Duration,
    pub max: Duration,
}

impl LatencyStats {
    /// Summarize `samples`; all zero when empty
    pub fn from_samples(mut samples: Vec<Duration>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();

        let n = samples.len();
        let total: Duration = samples.iter().sum();
        let p95_index = ((n as f64 * 0.95).ceil() as usize).clamp(1, n) - 1;

        Self {
            min: samples[0],
            mean: total / n as u32,
            p95: samples[p95_index],
            max: samples[n - 1],
        }
    }
}

/// Report printed at the end of a load run
#[derive(Debug, Clone)]
pub struct LoadTestReport {
    pub users: usize,
    pub outcomes: OutcomeCounts,
    pub latency: LatencyStats,
    pub elapsed: Duration,
    /// Users whose final balance differs from their accepted deltas
    pub conservation_violations: usize,
    /// Users whose final balance is below zero
    pub negative_balances: usize,
}

impl LoadTestReport {
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.outcomes.total() as f64 / secs
    }

    /// Conservation held and no balance went negative
    pub fn is_consistent(&self) -> bool {
        self.conservation_violations == 0 && self.negative_balances == 0
    }
}

impl fmt::Display for LoadTestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.outcomes;
        writeln!(f, "users:              {}", self.users)?;
        writeln!(f, "transactions:       {}", o.total())?;
        writeln!(f, "  succeeded:        {}", o.succeeded)?;
        writeln!(f, "  insufficient:     {}", o.insufficient_funds)?;
        writeln!(f, "  duplicate:        {}", o.duplicates)?;
        writeln!(f, "  timeout:          {}", o.timeouts)?;
        writeln!(f, "  other errors:     {}", o.other_errors)?;
        writeln!(f, "elapsed:            {:.3}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "throughput:         {:.1} tx/s", self.throughput())?;
        writeln!(
            f,
            "latency min/mean/p95/max: {:?} / {:?} / {:?} / {:?}",
            self.latency.min, self.latency.mean, self.latency.p95, self.latency.max
        )?;
        write!(
            f,
            "consistency:        {}",
            if self.is_consistent() { "ok" } else { "VIOLATED" }
        )
    }
}

/// One planned operation
#[derive(Debug, Clone)]
struct Operation {
    user_id: UserId,
    request: TransactionRequest,
}

/// Deterministic workload for `users`
fn plan(users: &[UserId], config: &LoadTestConfig) -> Vec<Operation> {
    (0..config.total_transactions())
        .map(|i| {
            let user_id = users[i % users.len()];
            let nth_for_user = i / users.len();
            let amount = Decimal::from(10 + (i % 90) as u64);
            let tx_type = if nth_for_user % 3 == 2 {
                TransactionType::Withdrawal
            } else {
                TransactionType::Deposit
            };
            Operation {
                user_id,
                request: TransactionRequest {
                    id: Uuid::new_v4().to_string(),
                    user_id,
                    currency: config.currency.clone(),
                    amount,
                    tx_type,
                },
            }
        })
        .collect()
}

/// Run the load test described by `config`
pub async fn run<S: LedgerStore>(
    engine: &LedgerEngine<S>,
    config: &LoadTestConfig,
) -> anyhow::Result<LoadTestReport> {
    let run_id = Uuid::new_v4().simple().to_string();
    let mut users = Vec::with_capacity(config.users);
    for i in 0..config.users {
        let user = engine
            .create_user(NewUser::new(
                format!("load-{i}"),
                format!("load-{}-{i}@loadtest.invalid", &run_id[..8]),
                30,
            ))
            .await
            .with_context(|| format!("failed to create load-test user {i}"))?;
        users.push(user.id);
    }

    let operations = plan(&users, config);
    info!(
        users = users.len(),
        transactions = operations.len(),
        concurrency = config.concurrency,
        "load test started"
    );

    let started = Instant::now();
    let results: Vec<_> = stream::iter(operations)
        .map(|op| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let start = Instant::now();
                let result = engine.create_transaction(op.request.clone()).await;
                (op, result.map(|_| ()), start.elapsed())
            })
        })
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    let elapsed = started.elapsed();

    let mut outcomes = OutcomeCounts::default();
    let mut latencies = Vec::with_capacity(results.len());
    let mut expected: HashMap<UserId, Decimal> = HashMap::new();
    for joined in results {
        let (op, result, latency) = joined.context("load-test task panicked")?;
        outcomes.record(&result);
        latencies.push(latency);
        if result.is_ok() {
            *expected.entry(op.user_id).or_default() += op.request.tx_type.signed(op.request.amount);
        }
    }

    let mut conservation_violations = 0;
    let mut negative_balances = 0;
    for user_id in &users {
        let actual = match engine.get_balance(*user_id, &config.currency).await {
            Ok(balance) => balance.amount,
            Err(LedgerError::NotFound { .. }) => Decimal::ZERO,
            Err(e) => return Err(e).context("failed to read final balance"),
        };
        let wanted = expected.get(user_id).copied().unwrap_or_default();
        if actual != wanted {
            warn!(user_id, %actual, expected = %wanted, "conservation violated");
            conservation_violations += 1;
        }
        if actual < Decimal::ZERO {
            negative_balances += 1;
        }
    }

    let report = LoadTestReport {
        users: users.len(),
        outcomes,
        latency: LatencyStats::from_samples(latencies),
        elapsed,
        conservation_violations,
        negative_balances,
    };
    info!(
        succeeded = report.outcomes.succeeded,
        throughput = report.throughput(),
        consistent = report.is_consistent(),
        "load test finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rstest::rstest;

    #[test]
    fn test_plan_is_deterministic_mix() {
        let config = LoadTestConfig::new(2, 3, 1, "USD");
        let ops = plan(&[10, 20], &config);

        let shape: Vec<_> = ops
            .iter()
            .map(|op| (op.user_id, op.request.tx_type, op.request.amount))
            .collect();
        assert_eq!(
            shape,
            vec![
                (10, TransactionType::Deposit, Decimal::from(10)),
                (20, TransactionType::Deposit, Decimal::from(11)),
                (10, TransactionType::Deposit, Decimal::from(12)),
                (20, TransactionType::Deposit, Decimal::from(13)),
                (10, TransactionType::Withdrawal, Decimal::from(14)),
                (20, TransactionType::Withdrawal, Decimal::from(15)),
            ]
        );
    }

    #[rstest]
    #[case::empty(vec![], LatencyStats::default())]
    #[case::single(
        vec![Duration::from_millis(4)],
        LatencyStats {
            min: Duration::from_millis(4),
            mean: Duration::from_millis(4),
            p95: Duration::from_millis(4),
            max: Duration::from_millis(4),
        }
    )]
    #[case::twenty(
        (1..=20).rev().map(Duration::from_millis).collect(),
        LatencyStats {
            min: Duration::from_millis(1),
            mean: Duration::from_micros(10_500),
            p95: Duration::from_millis(19),
            max: Duration::from_millis(20),
        }
    )]
    fn test_latency_stats(#[case] samples: Vec<Duration>, #[case] expected: LatencyStats) {
        assert_eq!(LatencyStats::from_samples(samples), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_is_consistent() {
        let engine = LedgerEngine::new(MemoryStore::new());
        let config = LoadTestConfig::new(5, 30, 8, "USD");

        let report = run(&engine, &config).await.unwrap();

        assert_eq!(report.outcomes.total(), 150);
        assert_eq!(report.outcomes.duplicates, 0);
        assert_eq!(report.outcomes.other_errors, 0);
        assert!(report.outcomes.succeeded >= 100);
        assert!(report.is_consistent());
        assert!(report.to_string().contains("consistency:        ok"));
    }
}
