//! Transaction processing engine
//!
//! This module provides the `LedgerEngine`, the coordinator that turns a
//! transaction request into one atomic unit of work against a `LedgerStore`.
//!
//! # Design
//!
//! `create_transaction` runs the balance-mutation procedure:
//!
//! 1. validate the request (no storage access on failure)
//! 2. derive the signed delta from the transaction type
//! 3. open a unit of work
//! 4. insert the ledger record (a reused ID aborts here)
//! 5. adjust the balance in the same unit (an overdraft aborts here)
//! 6. commit, or roll back on any failure
//!
//! Each attempt moves through the [`AttemptState`] machine:
//!
//! ```text
//! Started ─► LedgerInserted ─► BalanceAdjusted ─► Committed
//!    │             │                  │
//!    ▼             ▼                  ▼
//! LedgerInsertFailed  BalanceAdjustFailed  CommitFailed ─► RolledBack
//! ```
//!
//! No path ends in a partially committed state. Store errors are translated
//! into `LedgerError` here; the raw backend detail is logged and never
//! returned to the caller.
//!
//! # Thread Safety
//!
//! The engine is cloneable and every clone shares one store handle, so it can
//! be moved into as many tasks as needed. Serialization of writers to the
//! same balance is the store's job.

use crate::core::validation::{
    validate_currency, validate_new_user, validate_transaction, validate_user_id,
};
use crate::store::{LedgerStore, StoreError, UnitOfWork};
use crate::types::{
    Balance, BalanceKey, LedgerError, NewUser, Transaction, TransactionRequest, User, UserId,
};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Progress of one `create_transaction` attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Started,
    LedgerInserted,
    BalanceAdjusted,
    Committed,
    LedgerInsertFailed,
    BalanceAdjustFailed,
    CommitFailed,
    RolledBack,
}

impl AttemptState {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptState::Started => "started",
            AttemptState::LedgerInserted => "ledger_inserted",
            AttemptState::BalanceAdjusted => "balance_adjusted",
            AttemptState::Committed => "committed",
            AttemptState::LedgerInsertFailed => "ledger_insert_failed",
            AttemptState::BalanceAdjustFailed => "balance_adjust_failed",
            AttemptState::CommitFailed => "commit_failed",
            AttemptState::RolledBack => "rolled_back",
        }
    }

    /// Whether the attempt has ended
    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptState::Committed | AttemptState::RolledBack)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger coordinator over a storage backend
pub struct LedgerEngine<S> {
    store: Arc<S>,

    /// Deadline applied by `create_transaction`, if any
    transaction_timeout: Option<Duration>,
}

impl<S> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            transaction_timeout: self.transaction_timeout,
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Create a new LedgerEngine that owns `store`
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Create a new LedgerEngine over an already shared store
    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            transaction_timeout: None,
        }
    }

    /// Bound every `create_transaction` attempt by `timeout`
    pub fn with_transaction_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a user
    ///
    /// The name is stored trimmed.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - blank name, malformed email or non-positive age
    /// * `DuplicateEmail` - the email is already registered
    #[instrument(skip_all, fields(email = %user.email))]
    pub async fn create_user(&self, user: NewUser) -> Result<User, LedgerError> {
        validate_new_user(&user)?;
        let user = NewUser {
            name: user.name.trim().to_string(),
            ..user
        };

        match self.store.insert_user(&user, Utc::now()).await {
            Ok(created) => {
                debug!(user_id = created.id, "user created");
                Ok(created)
            }
            Err(StoreError::UniqueViolation { .. }) => {
                Err(LedgerError::duplicate_email(&user.email))
            }
            Err(e) => Err(internal("create_user", format!("user {}", user.email), e)),
        }
    }

    /// Look up a user by identifier
    pub async fn get_user(&self, id: UserId) -> Result<User, LedgerError> {
        validate_user_id(id)?;
        self.store
            .user(id)
            .await
            .map_err(|e| internal("get_user", format!("user {id}"), e))?
            .ok_or_else(|| LedgerError::not_found("user", id))
    }

    /// Apply a deposit or withdrawal atomically
    ///
    /// Uses the configured transaction timeout, if any.
    ///
    /// # Returns
    ///
    /// The persisted `Transaction`.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - a request field is malformed; nothing was written
    /// * `NotFound` - the user does not exist
    /// * `DuplicateTransaction` - the ID was already used; balances unchanged
    /// * `InsufficientFunds` - the withdrawal would overdraw; nothing was written
    /// * `Timeout` - the deadline expired and the unit was rolled back
    /// * `Internal` - storage failure; nothing was written
    pub async fn create_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<Transaction, LedgerError> {
        match self.transaction_timeout {
            Some(deadline) => self.create_transaction_within(request, deadline).await,
            None => self.attempt(&request).await,
        }
    }

    /// Apply a transaction, giving up after `deadline`
    ///
    /// On expiry the in-flight unit is dropped, which rolls it back, so a
    /// retry with the same ID starts clean.
    pub async fn create_transaction_within(
        &self,
        request: TransactionRequest,
        deadline: Duration,
    ) -> Result<Transaction, LedgerError> {
        match tokio::time::timeout(deadline, self.attempt(&request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    tx_id = %request.id,
                    timeout_ms = deadline.as_millis() as u64,
                    "transaction attempt timed out, unit rolled back"
                );
                Err(LedgerError::timeout("create_transaction", deadline))
            }
        }
    }

    #[instrument(
        name = "create_transaction",
        skip_all,
        fields(tx_id = %request.id, user_id = request.user_id, currency = %request.currency)
    )]
    async fn attempt(&self, request: &TransactionRequest) -> Result<Transaction, LedgerError> {
        validate_transaction(request)?;

        let record = Transaction {
            id: request.id.clone(),
            user_id: request.user_id,
            amount: request.amount,
            currency: request.currency.clone(),
            tx_type: request.tx_type,
            created_at: Utc::now(),
        };
        let delta = record.signed_amount();

        let mut unit = self
            .store
            .begin()
            .await
            .map_err(|e| translate(e, request))?;
        debug!(state = %AttemptState::Started, "unit opened");

        if let Err(e) = unit.insert_transaction(&record).await {
            return Err(abort::<S>(unit, AttemptState::LedgerInsertFailed, e, request).await);
        }
        debug!(state = %AttemptState::LedgerInserted);

        // Stamped after the ledger insert, which is where SQLite serializes
        // writers, so commit order and `updated_at` order agree
        if let Err(e) = unit
            .adjust_amount(record.user_id, &record.currency, delta, Utc::now())
            .await
        {
            return Err(abort::<S>(unit, AttemptState::BalanceAdjustFailed, e, request).await);
        }
        debug!(state = %AttemptState::BalanceAdjusted, %delta);

        if let Err(e) = unit.commit().await {
            // A failed commit leaves nothing behind in either backend
            debug!(state = %AttemptState::CommitFailed, error = %e);
            debug!(state = %AttemptState::RolledBack);
            return Err(translate(e, request));
        }
        debug!(state = %AttemptState::Committed, "transaction committed");

        Ok(record)
    }

    /// Committed balance of a (user, currency) pair
    ///
    /// # Errors
    ///
    /// * `NotFound` - the pair has never received a deposit
    pub async fn get_balance(&self, user_id: UserId, currency: &str) -> Result<Balance, LedgerError> {
        validate_user_id(user_id)?;
        validate_currency(currency)?;
        let key = BalanceKey::new(user_id, currency);
        self.store
            .balance(user_id, currency)
            .await
            .map_err(|e| internal("get_balance", format!("balance {key}"), e))?
            .ok_or_else(|| LedgerError::not_found("balance", key))
    }

    /// All balances of a user, ordered by currency
    pub async fn list_balances(&self, user_id: UserId) -> Result<Vec<Balance>, LedgerError> {
        validate_user_id(user_id)?;
        self.store
            .balances(user_id)
            .await
            .map_err(|e| internal("list_balances", format!("user {user_id}"), e))
    }

    /// Committed transaction by ID
    pub async fn get_transaction(&self, id: &str) -> Result<Transaction, LedgerError> {
        self.store
            .transaction(id)
            .await
            .map_err(|e| internal("get_transaction", format!("transaction {id}"), e))?
            .ok_or_else(|| LedgerError::not_found("transaction", id))
    }

    /// All transactions of a user in commit order (see `LedgerStore::transactions_by_user`)
    pub async fn list_transactions(&self, user_id: UserId) -> Result<Vec<Transaction>, LedgerError> {
        validate_user_id(user_id)?;
        self.store
            .transactions_by_user(user_id)
            .await
            .map_err(|e| internal("list_transactions", format!("user {user_id}"), e))
    }

    /// Close the underlying store
    pub async fn close(&self) {
        self.store.close().await;
    }
}

/// Roll back a failed unit and translate the error that failed it
async fn abort<S: LedgerStore>(
    unit: S::Unit,
    failed: AttemptState,
    error: StoreError,
    request: &TransactionRequest,
) -> LedgerError {
    debug!(state = %failed, error = %error);
    if let Err(rollback_error) = unit.rollback().await {
        // The unit is gone either way; the backend discards it on drop
        warn!(error = %rollback_error, "rollback failed");
    }
    debug!(state = %AttemptState::RolledBack);
    translate(error, request)
}

/// Map a store error raised while applying `request` to a caller-facing error
fn translate(error: StoreError, request: &TransactionRequest) -> LedgerError {
    match error {
        StoreError::UniqueViolation {
            entity: "transaction",
            ..
        } => LedgerError::duplicate_transaction(&request.id),
        StoreError::ForeignKeyViolation { target: "user", .. } => {
            LedgerError::not_found("user", request.user_id)
        }
        StoreError::NegativeBalance { .. } => {
            LedgerError::insufficient_funds(request.user_id, &request.currency, request.amount)
        }
        StoreError::Overflow { .. } => {
            LedgerError::invalid_input("amount", "would overflow the balance")
        }
        other => internal(
            "create_transaction",
            format!("transaction {}", request.id),
            other,
        ),
    }
}

fn internal(operation: &str, entity: String, error: StoreError) -> LedgerError {
    error!(operation, entity = %entity, error = %error, "storage failure");
    LedgerError::internal(operation, entity)
}
