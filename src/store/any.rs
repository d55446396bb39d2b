//! Runtime backend selection
//!
//! `LedgerStore` uses `impl Future` returns, so it is not object safe. The
//! binary picks a backend from configuration at startup; `AnyStore` is the
//! enum it dispatches through instead of a `Box<dyn _>`.

use crate::config::{LedgerConfig, StoreKind};
use crate::store::{
    LedgerStore, MemoryStore, MemoryUnit, SqliteStore, SqliteUnit, StoreError, UnitOfWork,
};
use crate::types::{Balance, NewUser, Transaction, User, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// One of the available backends
#[derive(Debug, Clone)]
pub enum AnyStore {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl AnyStore {
    /// Open the backend named in `config`
    pub async fn open(config: &LedgerConfig) -> Result<Self, StoreError> {
        match config.store {
            StoreKind::Memory => Ok(AnyStore::Memory(MemoryStore::new())),
            StoreKind::Sqlite => Ok(AnyStore::Sqlite(SqliteStore::connect(&config.sqlite).await?)),
        }
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            AnyStore::Memory(_) => StoreKind::Memory,
            AnyStore::Sqlite(_) => StoreKind::Sqlite,
        }
    }
}

/// Unit of work of whichever backend opened it
pub enum AnyUnit {
    Memory(MemoryUnit),
    Sqlite(SqliteUnit),
}

impl LedgerStore for AnyStore {
    type Unit = AnyUnit;

    async fn begin(&self) -> Result<AnyUnit, StoreError> {
        match self {
            AnyStore::Memory(store) => store.begin().await.map(AnyUnit::Memory),
            AnyStore::Sqlite(store) => store.begin().await.map(AnyUnit::Sqlite),
        }
    }

    async fn insert_user(
        &self,
        user: &NewUser,
        created_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        match self {
            AnyStore::Memory(store) => store.insert_user(user, created_at).await,
            AnyStore::Sqlite(store) => store.insert_user(user, created_at).await,
        }
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.user(id).await,
            AnyStore::Sqlite(store) => store.user(id).await,
        }
    }

    async fn balance(&self, user_id: UserId, currency: &str) -> Result<Option<Balance>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.balance(user_id, currency).await,
            AnyStore::Sqlite(store) => store.balance(user_id, currency).await,
        }
    }

    async fn balances(&self, user_id: UserId) -> Result<Vec<Balance>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.balances(user_id).await,
            AnyStore::Sqlite(store) => store.balances(user_id).await,
        }
    }

    async fn transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.transaction(id).await,
            AnyStore::Sqlite(store) => store.transaction(id).await,
        }
    }

    async fn transactions_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>, StoreError> {
        match self {
            AnyStore::Memory(store) => store.transactions_by_user(user_id).await,
            AnyStore::Sqlite(store) => store.transactions_by_user(user_id).await,
        }
    }

    async fn close(&self) {
        match self {
            AnyStore::Memory(store) => store.close().await,
            AnyStore::Sqlite(store) => store.close().await,
        }
    }
}

impl UnitOfWork for AnyUnit {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError> {
        match self {
            AnyUnit::Memory(unit) => unit.insert_transaction(transaction).await,
            AnyUnit::Sqlite(unit) => unit.insert_transaction(transaction).await,
        }
    }

    async fn adjust_amount(
        &mut self,
        user_id: UserId,
        currency: &str,
        delta: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self {
            AnyUnit::Memory(unit) => unit.adjust_amount(user_id, currency, delta, at).await,
            AnyUnit::Sqlite(unit) => unit.adjust_amount(user_id, currency, delta, at).await,
        }
    }

    async fn commit(self) -> Result<(), StoreError> {
        match self {
            AnyUnit::Memory(unit) => unit.commit().await,
            AnyUnit::Sqlite(unit) => unit.commit().await,
        }
    }

    async fn rollback(self) -> Result<(), StoreError> {
        match self {
            AnyUnit::Memory(unit) => unit.rollback().await,
            AnyUnit::Sqlite(unit) => unit.rollback().await,
        }
    }
}
