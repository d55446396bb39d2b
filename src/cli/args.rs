use crate::config::{LedgerConfig, LoadTestConfig, SqliteConfig, StoreKind};
use crate::telemetry::LogFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Multi-currency ledger with atomic, non-negative balance updates
#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Multi-currency ledger with atomic, non-negative balance updates", long_about = None)]
pub struct CliArgs {
    /// Storage backend
    #[arg(
        long = "store",
        value_name = "STORE",
        env = "LEDGER_STORE",
        default_value = "memory",
        global = true,
        help = "Storage backend: 'memory' or 'sqlite'"
    )]
    pub store: StoreKind,

    /// SQLite database URL (sqlite store only)
    #[arg(
        long = "database-url",
        value_name = "URL",
        env = "LEDGER_DATABASE_URL",
        global = true,
        help = "SQLite database URL (default: sqlite://ledger.db)"
    )]
    pub database_url: Option<String>,

    /// Connection pool size (sqlite store only)
    #[arg(
        long = "max-connections",
        value_name = "COUNT",
        global = true,
        help = "Maximum pooled SQLite connections (default: CPU cores)"
    )]
    pub max_connections: Option<u32>,

    /// Lock wait for SQLite writers
    #[arg(
        long = "busy-timeout-ms",
        value_name = "MS",
        global = true,
        help = "How long a SQLite writer waits for the lock (default: 5000)"
    )]
    pub busy_timeout_ms: Option<u64>,

    /// Deadline for a single transaction attempt
    #[arg(
        long = "transaction-timeout-ms",
        value_name = "MS",
        global = true,
        help = "Roll back a transaction attempt that takes longer than this"
    )]
    pub transaction_timeout_ms: Option<u64>,

    /// Log output format
    #[arg(
        long = "log-format",
        value_name = "FORMAT",
        default_value = "text",
        global = true,
        help = "Log format on stderr: 'text' or 'json'"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Apply a CSV of transactions and print the final balances as CSV
    Replay {
        /// Input CSV with columns type,client,tx,currency,amount
        #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
        input: PathBuf,
    },

    /// Drive concurrent synthetic load and report latency and consistency
    LoadTest {
        #[arg(long, value_name = "COUNT", default_value_t = 100)]
        users: usize,

        /// Transactions per user
        #[arg(long, value_name = "COUNT", default_value_t = 1000)]
        transactions: usize,

        /// Maximum in-flight transactions
        #[arg(long, value_name = "COUNT", default_value_t = 50)]
        concurrency: usize,

        #[arg(long, value_name = "CODE", default_value = "USD")]
        currency: String,
    },
}

impl CliArgs {
    /// Create a LedgerConfig from CLI arguments
    ///
    /// Unset SQLite options fall back to `SqliteConfig::default()`; zero
    /// values are replaced by the defaults with a warning.
    pub fn to_ledger_config(&self) -> LedgerConfig {
        let sqlite = if self.database_url.is_some()
            || self.max_connections.is_some()
            || self.busy_timeout_ms.is_some()
        {
            let default = SqliteConfig::default();
            SqliteConfig::new(
                self.database_url.clone().unwrap_or(default.database_url),
                self.max_connections.unwrap_or(default.max_connections),
                self.busy_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default.busy_timeout),
            )
        } else {
            SqliteConfig::default()
        };

        LedgerConfig {
            store: self.store,
            sqlite,
            transaction_timeout: self
                .transaction_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }

    /// LoadTestConfig for the `load-test` command, `None` for other commands
    pub fn to_load_test_config(&self) -> Option<LoadTestConfig> {
        match &self.command {
            Command::LoadTest {
                users,
                transactions,
                concurrency,
                currency,
            } => Some(LoadTestConfig::new(
                *users,
                *transactions,
                *concurrency,
                currency.clone(),
            )),
            Command::Replay { .. } => None,
        }
    }
}
