//! Runtime configuration
//!
//! Every struct here has a `Default` and a `new` constructor that replaces
//! zero values with the default and logs a warning, so a bad flag never
//! produces an unusable pool or an empty load run.

use clap::ValueEnum;
use std::time::Duration;
use tracing::warn;

/// Storage backend selected at startup
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Process-local tables, lost on exit
    #[default]
    Memory,
    /// SQLite database file
    Sqlite,
}

/// Connection settings for the SQLite backend
#[derive(Clone, Debug, PartialEq)]
pub struct SqliteConfig {
    /// e.g. `sqlite://ledger.db`; the file is created if missing
    pub database_url: String,
    /// Pool size
    pub max_connections: u32,
    /// How long a writer waits for the database lock
    pub busy_timeout: Duration,
    /// How long a caller waits for a pooled connection
    pub acquire_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://ledger.db".to_string(),
            max_connections: num_cpus::get() as u32,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl SqliteConfig {
    /// Create a SqliteConfig with custom values
    pub fn new(
        database_url: impl Into<String>,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Self {
        let default = Self::default();

        let max_connections = if max_connections == 0 {
            warn!(
                max_connections,
                default = default.max_connections,
                "invalid max_connections, using default"
            );
            default.max_connections
        } else {
            max_connections
        };

        let busy_timeout = if busy_timeout.is_zero() {
            warn!(
                default_ms = default.busy_timeout.as_millis() as u64,
                "invalid busy_timeout (0ms), using default"
            );
            default.busy_timeout
        } else {
            busy_timeout
        };

        Self {
            database_url: database_url.into(),
            max_connections,
            busy_timeout,
            acquire_timeout: default.acquire_timeout,
        }
    }
}

/// Engine and storage configuration
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LedgerConfig {
    pub store: StoreKind,
    pub sqlite: SqliteConfig,
    /// Deadline for a single `create_transaction` attempt; `None` waits forever
    pub transaction_timeout: Option<Duration>,
}

/// Parameters of a load-test run
#[derive(Clone, Debug, PartialEq)]
pub struct LoadTestConfig {
    /// Number of users created before the run
    pub users: usize,
    /// Transactions submitted per user
    pub transactions_per_user: usize,
    /// Maximum number of in-flight transactions
    pub concurrency: usize,
    pub currency: String,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            users: 100,
            transactions_per_user: 1000,
            concurrency: 50,
            currency: "USD".to_string(),
        }
    }
}

impl LoadTestConfig {
    /// Create a LoadTestConfig with custom values
    pub fn new(
        users: usize,
        transactions_per_user: usize,
        concurrency: usize,
        currency: impl Into<String>,
    ) -> Self {
        let default = Self::default();

        let users = if users == 0 {
            warn!(users, default = default.users, "invalid users, using default");
            default.users
        } else {
            users
        };

        let transactions_per_user = if transactions_per_user == 0 {
            warn!(
                transactions_per_user,
                default = default.transactions_per_user,
                "invalid transactions, using default"
            );
            default.transactions_per_user
        } else {
            transactions_per_user
        };

        let concurrency = if concurrency == 0 {
            warn!(
                concurrency,
                default = default.concurrency,
                "invalid concurrency, using default"
            );
            default.concurrency
        } else {
            concurrency
        };

        Self {
            users,
            transactions_per_user,
            concurrency,
            currency: currency.into(),
        }
    }

    /// Total number of transactions the run submits
    pub fn total_transactions(&self) -> usize {
        self.users * self.transactions_per_user
    }
}
