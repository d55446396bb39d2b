//! Storage layer
//!
//! This module defines the repository seam between the engine and a backend:
//! - `LedgerStore` - the shared, long-lived store handle (reads + `begin`)
//! - `UnitOfWork` - one atomic unit spanning the ledger insert and the
//!   balance adjustment, finished by `commit` or `rollback`
//! - `StoreError` - backend-neutral failure kinds, translated by the engine
//!
//! Two backends implement the seam:
//! - `memory` - sharded in-process tables with per-row locks
//! - `sqlite` - a relational store whose constraints enforce the invariants
//!
//! `AnyStore` dispatches to one of them, selected at runtime from config.

pub mod any;
pub mod memory;
pub mod sqlite;

pub use any::{AnyStore, AnyUnit};
pub use memory::{MemoryStore, MemoryUnit};
pub use sqlite::{SqliteStore, SqliteUnit};

use crate::types::{Balance, NewUser, Transaction, User, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use thiserror::Error;

/// Backend-neutral storage failures
///
/// The first four variants are constraint outcomes the engine turns into
/// caller-facing errors; the rest become `LedgerError::Internal`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A unique key already exists (transaction ID, user email)
    #[error("{entity} with key {key} already exists")]
    UniqueViolation { entity: &'static str, key: String },

    /// A row references a parent that does not exist
    #[error("{entity} references missing {target} {key}")]
    ForeignKeyViolation {
        entity: &'static str,
        target: &'static str,
        key: String,
    },

    /// The adjustment would leave the balance below zero
    #[error("balance of user {user_id} in {currency} would become negative")]
    NegativeBalance { user_id: UserId, currency: String },

    /// The adjusted amount would exceed `max_amount`
    #[error("balance of user {user_id} in {currency} would overflow")]
    Overflow { user_id: UserId, currency: String },

    /// A stored row could not be decoded
    #[error("corrupt {entity} row: {message}")]
    Corrupt {
        entity: &'static str,
        message: String,
    },

    /// Any other backend failure (connectivity, locking, I/O)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::Backend(error.to_string())
    }
}

/// Shared store handle
///
/// Implementations are cheap to share behind an `Arc` and safe to use from
/// many tasks at once. Readers only ever observe committed units.
pub trait LedgerStore: Send + Sync + 'static {
    /// Atomic unit of work produced by `begin`
    type Unit: UnitOfWork;

    /// Open a new unit of work
    fn begin(&self) -> impl Future<Output = Result<Self::Unit, StoreError>> + Send;

    /// Insert a user, assigning its identifier
    ///
    /// Fails with `UniqueViolation` if the email is taken.
    fn insert_user(
        &self,
        user: &NewUser,
        created_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Look up a user by identifier
    fn user(&self, id: UserId) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Committed balance of a (user, currency) pair
    fn balance(
        &self,
        user_id: UserId,
        currency: &str,
    ) -> impl Future<Output = Result<Option<Balance>, StoreError>> + Send;

    /// All committed balances of a user, ordered by currency
    fn balances(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Balance>, StoreError>> + Send;

    /// Committed transaction by identifier
    fn transaction(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Transaction>, StoreError>> + Send;

    /// All committed transactions of a user in commit order
    ///
    /// Under concurrent writers this can differ from `created_at` order: a
    /// record stamped earlier may commit later.
    fn transactions_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Transaction>, StoreError>> + Send;

    /// Release backend resources; the handle must not be used afterwards
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// One atomic unit spanning ledger inserts and balance adjustments
///
/// Nothing written through a unit is visible to readers before `commit`
/// succeeds. Dropping a unit without committing discards its writes, which is
/// what makes a cancelled attempt safe.
pub trait UnitOfWork: Send {
    /// Append a transaction record
    ///
    /// Fails with `UniqueViolation` for a reused ID and `ForeignKeyViolation`
    /// for an unknown user.
    fn insert_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Apply `amount += delta` to the (user, currency) balance
    ///
    /// Creates the row for a non-negative delta if it does not exist. A
    /// result below zero fails with `NegativeBalance`, either here or at
    /// `commit`, depending on when the backend enforces the constraint.
    fn adjust_amount(
        &mut self,
        user_id: UserId,
        currency: &str,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Make every write of this unit visible at once
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Discard every write of this unit
    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
