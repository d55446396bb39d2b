//! SQLite ledger store
//!
//! This module provides `SqliteStore`, a pooled `sqlx` backend, and
//! `SqliteUnit`, a unit of work wrapping one database transaction.
//!
//! # Design
//!
//! The schema carries the invariants: `UNIQUE` on transaction IDs and
//! emails, foreign keys from balances and transactions to users, and the
//! named CHECK constraint `balance_amount_non_negative`. A balance adjustment
//! is one `UPDATE ... SET amount = amount + ?` statement, so the new amount is
//! computed, checked and written by the database in a single step. Constraint
//! failures are mapped onto `StoreError` here; callers never see sqlx errors.
//!
//! # Concurrency
//!
//! The database runs in WAL mode so readers never block the single writer.
//! A unit's first statement is a write, which makes SQLite's busy handler
//! (bounded by `busy_timeout`) queue competing writers instead of failing
//! them. Dropping a `SqliteUnit` rolls its transaction back.
//!
//! `sqlite::memory:` URLs give every pooled connection its own database; use
//! a file URL whenever the pool has more than one connection.

mod schema;

pub use schema::{
    from_minor_units, to_minor_units, BalanceRow, TransactionRow, UserRow, INTEGRAL_CONSTRAINT,
    NON_NEGATIVE_CONSTRAINT,
};

use crate::config::SqliteConfig;
use crate::store::{LedgerStore, StoreError, UnitOfWork};
use crate::types::{Balance, NewUser, Transaction, User, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use std::str::FromStr;
use tracing::{debug, info};

/// Pooled SQLite ledger store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the pool and apply pending migrations
    pub async fn connect(config: &SqliteConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;

        info!(
            url = %config.database_url,
            max_connections = config.max_connections,
            "sqlite store ready"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Constraint a database error violated, if any
#[derive(Debug, PartialEq, Eq)]
enum Violation {
    Unique,
    ForeignKey,
    NonNegative,
    Integral,
}

fn violation(error: &sqlx::Error) -> Option<Violation> {
    let sqlx::Error::Database(db) = error else {
        return None;
    };
    if db.is_unique_violation() {
        Some(Violation::Unique)
    } else if db.is_foreign_key_violation() {
        Some(Violation::ForeignKey)
    } else if db.is_check_violation() && db.message().contains(NON_NEGATIVE_CONSTRAINT) {
        Some(Violation::NonNegative)
    } else if db.is_check_violation() && db.message().contains(INTEGRAL_CONSTRAINT) {
        Some(Violation::Integral)
    } else {
        None
    }
}

fn balance_error(error: sqlx::Error, user_id: UserId, currency: &str) -> StoreError {
    match violation(&error) {
        Some(Violation::NonNegative) => StoreError::NegativeBalance {
            user_id,
            currency: currency.to_string(),
        },
        Some(Violation::Integral) => StoreError::Overflow {
            user_id,
            currency: currency.to_string(),
        },
        Some(Violation::ForeignKey) => StoreError::ForeignKeyViolation {
            entity: "balance",
            target: "user",
            key: user_id.to_string(),
        },
        Some(Violation::Unique) => StoreError::UniqueViolation {
            entity: "balance",
            key: format!("{user_id}/{currency}"),
        },
        None => error.into(),
    }
}

fn transaction_error(error: sqlx::Error, transaction: &Transaction) -> StoreError {
    match violation(&error) {
        Some(Violation::Unique) => StoreError::UniqueViolation {
            entity: "transaction",
            key: transaction.id.clone(),
        },
        Some(Violation::ForeignKey) => StoreError::ForeignKeyViolation {
            entity: "transaction",
            target: "user",
            key: transaction.user_id.to_string(),
        },
        _ => error.into(),
    }
}

/// One SQLite transaction
pub struct SqliteUnit {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl LedgerStore for SqliteStore {
    type Unit = SqliteUnit;

    async fn begin(&self) -> Result<SqliteUnit, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(SqliteUnit { tx })
    }

    async fn insert_user(
        &self,
        user: &NewUser,
        created_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (name, email, age, created_at) VALUES (?, ?, ?, ?) \
             RETURNING id, name, email, age, created_at",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.age)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique) => StoreError::UniqueViolation {
                entity: "user",
                key: user.email.clone(),
            },
            _ => e.into(),
        })?;
        Ok(row.into())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, age, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn balance(&self, user_id: UserId, currency: &str) -> Result<Option<Balance>, StoreError> {
        let row = sqlx::query_as::<_, BalanceRow>(
            "SELECT user_id, currency, amount, created_at, updated_at FROM balances \
             WHERE user_id = ? AND currency = ?",
        )
        .bind(user_id)
        .bind(currency)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Balance::from))
    }

    async fn balances(&self, user_id: UserId) -> Result<Vec<Balance>, StoreError> {
        let rows = sqlx::query_as::<_, BalanceRow>(
            "SELECT user_id, currency, amount, created_at, updated_at FROM balances \
             WHERE user_id = ? ORDER BY currency",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Balance::from).collect())
    }

    async fn transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, amount, currency, type, created_at FROM transactions \
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Transaction::try_from).transpose()
    }

    async fn transactions_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, amount, currency, type, created_at FROM transactions \
             WHERE user_id = ? ORDER BY rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn close(&self) {
        debug!("closing sqlite pool");
        self.pool.close().await;
    }
}

impl UnitOfWork for SqliteUnit {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError> {
        let amount = to_minor_units(transaction.amount).ok_or_else(|| StoreError::Overflow {
            user_id: transaction.user_id,
            currency: transaction.currency.clone(),
        })?;

        sqlx::query(
            "INSERT INTO transactions (id, user_id, amount, currency, type, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&transaction.id)
        .bind(transaction.user_id)
        .bind(amount)
        .bind(&transaction.currency)
        .bind(transaction.tx_type.as_str())
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| transaction_error(e, transaction))?;
        Ok(())
    }

    async fn adjust_amount(
        &mut self,
        user_id: UserId,
        currency: &str,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let units = to_minor_units(delta).ok_or_else(|| StoreError::Overflow {
            user_id,
            currency: currency.to_string(),
        })?;

        let updated = sqlx::query(
            "UPDATE balances SET amount = amount + ?, updated_at = ? \
             WHERE user_id = ? AND currency = ?",
        )
        .bind(units)
        .bind(at)
        .bind(user_id)
        .bind(currency)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| balance_error(e, user_id, currency))?;

        if updated.rows_affected() > 0 {
            return Ok(());
        }
        if delta < Decimal::ZERO {
            return Err(StoreError::NegativeBalance {
                user_id,
                currency: currency.to_string(),
            });
        }

        sqlx::query(
            "INSERT INTO balances (user_id, currency, amount, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(currency)
        .bind(units)
        .bind(at)
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| balance_error(e, user_id, currency))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
