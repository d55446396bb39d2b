//! Rust Ledger Engine CLI
//!
//! # Usage
//!
//! ```bash
//! cargo run -- replay transactions.csv > balances.csv
//! cargo run -- --store sqlite --database-url sqlite://ledger.db replay transactions.csv
//! cargo run --release -- load-test --users 100 --transactions 1000 --concurrency 50
//! RUST_LOG=debug cargo run -- --log-format json replay transactions.csv
//! ```
//!
//! `replay` reads rows with columns `type,client,tx,currency,amount`, applies
//! them in file order and writes `client,currency,amount` to stdout.
//! `load-test` prints a latency, throughput and consistency report.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (unreadable input, storage failure, inconsistent load-test result)

use anyhow::{bail, Context};
use rust_ledger_engine::cli::{self, Command};
use rust_ledger_engine::runner::{self, load_test};
use rust_ledger_engine::{telemetry, write_balances_csv, AnyStore, LedgerEngine};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse_args();

    if let Err(e) = telemetry::init(args.log_format) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: cli::CliArgs) -> anyhow::Result<()> {
    let config = args.to_ledger_config();
    let store = AnyStore::open(&config)
        .await
        .with_context(|| format!("failed to open {:?} store", config.store))?;
    let engine = LedgerEngine::new(store).with_transaction_timeout(config.transaction_timeout);

    let result = execute(&engine, &args).await;
    engine.close().await;
    result
}

async fn execute(engine: &LedgerEngine<AnyStore>, args: &cli::CliArgs) -> anyhow::Result<()> {
    match &args.command {
        Command::Replay { input } => {
            let outcome = runner::replay(engine, input)
                .await
                .with_context(|| format!("replay of '{}' failed", input.display()))?;

            let mut output = std::io::stdout();
            write_balances_csv(&outcome.balances, &mut output).map_err(anyhow::Error::msg)?;
            Ok(())
        }
        Command::LoadTest { .. } => {
            let config = args.to_load_test_config().unwrap_or_default();
            let report = load_test::run(engine, &config).await?;

            println!("{report}");
            if !report.is_consistent() {
                bail!("load test finished with inconsistent balances");
            }
            Ok(())
        }
    }
}
