//! Balance-related types for the ledger
//!
//! A balance is identified by the (user, currency) pair and only ever changes
//! through a signed adjustment applied inside a unit of work.

use super::transaction::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a balance row
///
/// Ordered by user then currency. The in-memory store relies on this order to
/// lock several rows without deadlocking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BalanceKey {
    pub user_id: UserId,
    pub currency: String,
}

impl BalanceKey {
    pub fn new(user_id: UserId, currency: impl Into<String>) -> Self {
        Self {
            user_id,
            currency: currency.into(),
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {} / {}", self.user_id, self.currency)
    }
}

/// Balance of one user in one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: UserId,
    pub currency: String,

    /// Never negative
    pub amount: Decimal,

    pub created_at: DateTime<Utc>,

    /// Refreshed by every successful adjustment
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Create a balance row for a pair seen for the first time
    pub fn opened(key: BalanceKey, amount: Decimal, at: DateTime<Utc>) -> Self {
        Balance {
            user_id: key.user_id,
            currency: key.currency,
            amount,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.user_id, self.currency.clone())
    }
}
