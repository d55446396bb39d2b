//! Row types and amount encoding for the SQLite backend
//!
//! The tables themselves are defined in `migrations/`. Amounts are stored as
//! `INTEGER` ten-thousandths so that the non-negativity CHECK compares exact
//! integers, never floats.

use crate::store::StoreError;
use crate::types::{Balance, Transaction, User, AMOUNT_SCALE};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// CHECK constraint that keeps every balance at or above zero
pub const NON_NEGATIVE_CONSTRAINT: &str = "balance_amount_non_negative";

/// CHECK constraint that rejects amounts that overflowed into REAL
pub const INTEGRAL_CONSTRAINT: &str = "balance_amount_integral";

/// Row type for table `users`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `balances`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BalanceRow {
    pub user_id: i64,
    pub currency: String,
    pub amount: i64, // ten-thousandths
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for table `transactions`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: String,
    pub user_id: i64,
    pub amount: i64, // ten-thousandths
    pub currency: String,
    #[sqlx(rename = "type")]
    pub tx_type: String,
    pub created_at: DateTime<Utc>,
}

// === Conversion implementations ===

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            age: row.age,
            created_at: row.created_at,
        }
    }
}

impl From<BalanceRow> for Balance {
    fn from(row: BalanceRow) -> Self {
        Balance {
            user_id: row.user_id,
            currency: row.currency,
            amount: from_minor_units(row.amount),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let tx_type = row.tx_type.parse().map_err(|message| StoreError::Corrupt {
            entity: "transaction",
            message,
        })?;
        Ok(Transaction {
            id: row.id,
            user_id: row.user_id,
            amount: from_minor_units(row.amount),
            currency: row.currency,
            tx_type,
            created_at: row.created_at,
        })
    }
}

/// Encode an amount as ten-thousandths
///
/// Returns `None` if the amount has more than four fractional digits or does
/// not fit in `i64` once scaled.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let mut scaled = amount;
    scaled.rescale(AMOUNT_SCALE);
    if scaled.scale() != AMOUNT_SCALE || scaled != amount {
        return None;
    }
    i64::try_from(scaled.mantissa()).ok()
}

/// Decode ten-thousandths into a four-decimal amount
pub fn from_minor_units(units: i64) -> Decimal {
    Decimal::new(units, AMOUNT_SCALE)
}
