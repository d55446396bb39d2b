//! In-memory ledger store
//!
//! This module provides `MemoryStore`, a process-local backend built from
//! three concurrent tables, and `MemoryUnit`, its unit of work.
//!
//! # Design
//!
//! A unit never touches shared state before `commit`. `insert_transaction`
//! and `adjust_amount` probe the tables so the common failures (unknown user,
//! reused ID, overdraft) surface at the same step as in a relational store,
//! then stage the write locally. `commit` is where the invariants are
//! actually enforced:
//!
//! 1. lock every touched balance row, in ascending key order
//! 2. compute the new row states with `apply_delta`, failing on overdraft
//! 3. reserve the transaction IDs as pending ledger slots
//! 4. write the row states, publish the ledger records, release the rows
//!
//! Any failure before step 4 leaves shared state exactly as it was. Dropping
//! a unit (a cancelled attempt) simply discards the staged writes.
//!
//! # Thread Safety
//!
//! Two units adjusting the same balance serialize on that row's mutex; the
//! second one recomputes against the first one's committed amount, so
//! concurrent withdrawals can never overdraw. Units touching different rows
//! commit fully in parallel.

mod balance_table;
mod transaction_table;
mod user_table;

pub use balance_table::BalanceTable;
pub use transaction_table::TransactionTable;
pub use user_table::UserTable;

use self::balance_table::{apply_delta, lock};
use crate::store::{LedgerStore, StoreError, UnitOfWork};
use crate::types::{Balance, BalanceKey, NewUser, Transaction, User, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct Tables {
    users: UserTable,
    balances: BalanceTable,
    transactions: TransactionTable,
}

/// Process-local ledger store
///
/// Cloning is cheap and every clone shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transactions across all users
    pub fn transaction_count(&self) -> usize {
        self.tables.transactions.len()
    }
}

#[derive(Debug, Clone)]
struct Adjustment {
    key: BalanceKey,
    delta: Decimal,
    at: DateTime<Utc>,
}

/// Staged writes of one in-memory unit of work
#[derive(Debug)]
pub struct MemoryUnit {
    tables: Arc<Tables>,
    inserts: Vec<Transaction>,
    adjustments: Vec<Adjustment>,
}

impl MemoryUnit {
    fn new(tables: Arc<Tables>) -> Self {
        Self {
            tables,
            inserts: Vec::new(),
            adjustments: Vec::new(),
        }
    }

    fn stage_insert(&mut self, transaction: &Transaction) -> Result<(), StoreError> {
        if !self.tables.users.exists(transaction.user_id) {
            return Err(StoreError::ForeignKeyViolation {
                entity: "transaction",
                target: "user",
                key: transaction.user_id.to_string(),
            });
        }

        let staged = self.inserts.iter().any(|t| t.id == transaction.id);
        if staged || self.tables.transactions.is_taken(&transaction.id) {
            return Err(StoreError::UniqueViolation {
                entity: "transaction",
                key: transaction.id.clone(),
            });
        }

        self.inserts.push(transaction.clone());
        Ok(())
    }

    fn stage_adjustment(&mut self, adjustment: Adjustment) -> Result<(), StoreError> {
        if !self.tables.users.exists(adjustment.key.user_id) {
            return Err(StoreError::ForeignKeyViolation {
                entity: "balance",
                target: "user",
                key: adjustment.key.user_id.to_string(),
            });
        }

        // Probe against the committed row plus what this unit already staged.
        // The authoritative check is repeated under the row lock at commit.
        let mut projected = self.tables.balances.get(&adjustment.key)?;
        for staged in self.adjustments.iter().filter(|a| a.key == adjustment.key) {
            projected = Some(apply_delta(projected, &staged.key, staged.delta, staged.at)?);
        }
        apply_delta(projected, &adjustment.key, adjustment.delta, adjustment.at)?;

        self.adjustments.push(adjustment);
        Ok(())
    }

    fn apply(&self) -> Result<(), StoreError> {
        let mut keys: Vec<BalanceKey> = self.adjustments.iter().map(|a| a.key.clone()).collect();
        keys.sort();
        keys.dedup();

        let slots = self.tables.balances.slots(&keys);
        let mut rows = slots.iter().map(lock).collect::<Result<Vec<_>, _>>()?;

        let mut states: Vec<Option<Balance>> = rows.iter().map(|row| (**row).clone()).collect();
        for adjustment in &self.adjustments {
            let index = keys
                .binary_search(&adjustment.key)
                .map_err(|_| StoreError::Backend(format!("unlocked row {}", adjustment.key)))?;
            let next = apply_delta(
                states[index].take(),
                &adjustment.key,
                adjustment.delta,
                adjustment.at,
            )?;
            states[index] = Some(next);
        }

        self.tables.transactions.reserve(&self.inserts)?;

        for (row, state) in rows.iter_mut().zip(states) {
            **row = state;
        }
        self.tables.transactions.publish(&self.inserts);

        drop(rows);
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, StoreError> {
        Ok(MemoryUnit::new(Arc::clone(&self.tables)))
    }

    async fn insert_user(
        &self,
        user: &NewUser,
        created_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        self.tables.users.insert(user, created_at)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.users.get(id))
    }

    async fn balance(&self, user_id: UserId, currency: &str) -> Result<Option<Balance>, StoreError> {
        self.tables
            .balances
            .get(&BalanceKey::new(user_id, currency))
    }

    async fn balances(&self, user_id: UserId) -> Result<Vec<Balance>, StoreError> {
        self.tables.balances.for_user(user_id)
    }

    async fn transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        Ok(self.tables.transactions.get(id))
    }

    async fn transactions_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.tables.transactions.for_user(user_id))
    }

    async fn close(&self) {
        debug!(
            users = self.tables.users.len(),
            balances = self.tables.balances.len(),
            transactions = self.tables.transactions.len(),
            "closing in-memory store"
        );
    }
}

impl UnitOfWork for MemoryUnit {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError> {
        self.stage_insert(transaction)
    }

    async fn adjust_amount(
        &mut self,
        user_id: UserId,
        currency: &str,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.stage_adjustment(Adjustment {
            key: BalanceKey::new(user_id, currency),
            delta,
            at,
        })
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.apply()
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
