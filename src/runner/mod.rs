//! Drivers that exercise the engine end to end
//!
//! - `replay` - apply a CSV file row by row and collect the final balances
//! - `load_test` - concurrent synthetic load with a consistency report

pub mod load_test;
pub mod replay;

pub use load_test::{LatencyStats, LoadTestReport, OutcomeCounts};
pub use replay::{replay, ReplayOutcome, ReplaySummary};
