//! Transaction-related types for the ledger
//!
//! This module defines the transaction type enum, the caller-facing request
//! and the immutable record persisted by the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User identifier (auto-assigned by the store, starts at 1)
pub type UserId = i64;

/// Transaction identifier
///
/// Supplied by the caller and doubles as the idempotency key.
pub type TransactionId = String;

/// Number of fractional digits the ledger keeps for every amount
pub const AMOUNT_SCALE: u32 = 4;

/// Largest amount or balance the ledger holds
///
/// Its ten-thousandths are exactly `i64::MAX`, the widest integer SQLite
/// stores.
pub fn max_amount() -> Decimal {
    Decimal::new(i64::MAX, AMOUNT_SCALE)
}

/// Transaction types supported by the ledger
///
/// The stored amount is always positive; the sign of the balance change is
/// implied by the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Credit funds to a balance
    ///
    /// Creates the balance row if the (user, currency) pair has none yet.
    Deposit,

    /// Debit funds from a balance
    ///
    /// Requires an existing balance that stays non-negative afterwards.
    Withdrawal,
}

impl TransactionType {
    /// Lowercase wire name, also used as the stored column value
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }

    /// Signed balance change for a positive `amount`
    ///
    /// Positive for deposits, negative for withdrawals.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Deposit => amount,
            TransactionType::Withdrawal => -amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    /// Case-insensitive parse of `deposit` / `withdrawal`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            other => Err(format!(
                "unknown transaction type '{}', expected deposit or withdrawal",
                other
            )),
        }
    }
}

/// Request to create a transaction
///
/// This is what the outer surface (CSV replay, load driver, a future HTTP
/// handler) hands to the engine. Nothing here has been validated yet.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    /// Caller-supplied idempotency key
    pub id: TransactionId,

    /// Owner of the affected balance
    pub user_id: UserId,

    /// Currency code of the affected balance
    pub currency: String,

    /// Positive amount with at most four fractional digits
    pub amount: Decimal,

    /// Deposit or withdrawal
    pub tx_type: TransactionType,
}

impl TransactionRequest {
    /// Build a deposit request
    pub fn deposit(
        id: impl Into<TransactionId>,
        user_id: UserId,
        currency: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            user_id,
            currency: currency.into(),
            amount,
            tx_type: TransactionType::Deposit,
        }
    }

    /// Build a withdrawal request
    pub fn withdrawal(
        id: impl Into<TransactionId>,
        user_id: UserId,
        currency: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            user_id,
            currency: currency.into(),
            amount,
            tx_type: TransactionType::Withdrawal,
        }
    }
}

/// Persisted transaction record
///
/// Immutable once committed. Serializes to the response shape
/// `{id, user_id, amount, currency, type, created_at}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub currency: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Signed balance change this record applies
    pub fn signed_amount(&self) -> Decimal {
        self.tx_type.signed(self.amount)
    }
}
