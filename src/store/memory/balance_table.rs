//! Thread-safe balance rows for the in-memory store
//!
//! This module provides the `BalanceTable` struct, which keeps one row per
//! (user, currency) pair behind its own mutex.
//!
//! # Design
//!
//! `DashMap` only locates the row; the row itself is an `Arc<Mutex<_>>` so a
//! committing unit can hold the lock of several rows at once without holding
//! any `DashMap` shard lock. A row slot may be empty (`None`): it is created
//! the first time a unit locks a pair, and only becomes a balance once that
//! unit commits. Readers treat an empty slot as "no balance".
//!
//! # Thread Safety
//!
//! Rows are always locked in ascending `BalanceKey` order (see
//! [`BalanceTable::slots`]), so two units touching overlapping rows can never
//! deadlock. The non-negativity check runs while the row lock is held, in the
//! same critical section that writes the new amount.

use crate::store::StoreError;
use crate::types::{max_amount, Balance, BalanceKey, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};

/// A lockable balance slot
pub type BalanceSlot = Arc<Mutex<Option<Balance>>>;

/// Concurrent balance rows keyed by (user, currency)
#[derive(Debug, Default)]
pub struct BalanceTable {
    /// Row slots; DashMap shards keep lookups of different pairs independent
    rows: DashMap<BalanceKey, BalanceSlot>,
}

impl BalanceTable {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    /// Committed balance of a pair, if any
    ///
    /// Blocks while a unit that touches this row is committing, so the value
    /// returned is never a half-applied commit.
    pub fn get(&self, key: &BalanceKey) -> Result<Option<Balance>, StoreError> {
        // Clone the Arc so the shard lock is released before the row lock is taken
        let slot = match self.rows.get(key) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Ok(None),
        };
        let row = lock(&slot)?;
        Ok(row.clone())
    }

    /// All committed balances of a user, ordered by currency
    pub fn for_user(&self, user_id: UserId) -> Result<Vec<Balance>, StoreError> {
        let mut slots: Vec<(BalanceKey, BalanceSlot)> = self
            .rows
            .iter()
            .filter(|entry| entry.key().user_id == user_id)
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));

        let mut balances = Vec::with_capacity(slots.len());
        for (_, slot) in slots {
            if let Some(balance) = lock(&slot)?.clone() {
                balances.push(balance);
            }
        }
        Ok(balances)
    }

    /// Slots for `keys`, created empty where missing
    ///
    /// `keys` must already be sorted and deduplicated; callers lock the
    /// returned slots in this order.
    pub fn slots(&self, keys: &[BalanceKey]) -> Vec<BalanceSlot> {
        keys.iter()
            .map(|key| {
                Arc::clone(
                    self.rows
                        .entry(key.clone())
                        .or_insert_with(|| Arc::new(Mutex::new(None)))
                        .value(),
                )
            })
            .collect()
    }

    /// Number of pairs that hold a committed balance
    pub fn len(&self) -> usize {
        self.rows
            .iter()
            .filter(|entry| matches!(entry.value().lock(), Ok(row) if row.is_some()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock one slot, mapping poisoning to a backend error
pub fn lock(slot: &BalanceSlot) -> Result<MutexGuard<'_, Option<Balance>>, StoreError> {
    slot.lock()
        .map_err(|_| StoreError::Backend("balance row lock poisoned".to_string()))
}

/// Apply a signed delta to the current state of a row
///
/// This is the add-and-check step: the new amount is computed and validated
/// here and the caller writes it while still holding the row lock.
///
/// * missing row, `delta >= 0` - the row is opened with `amount = delta`
/// * missing row, `delta < 0` - `NegativeBalance`
/// * existing row - `amount + delta`, rejected if below zero or above
///   [`max_amount`]
///
/// `updated_at` never moves backwards, even when a unit stamped earlier
/// commits after a later one.
pub fn apply_delta(
    current: Option<Balance>,
    key: &BalanceKey,
    delta: Decimal,
    at: DateTime<Utc>,
) -> Result<Balance, StoreError> {
    let negative = || StoreError::NegativeBalance {
        user_id: key.user_id,
        currency: key.currency.clone(),
    };
    let overflow = || StoreError::Overflow {
        user_id: key.user_id,
        currency: key.currency.clone(),
    };

    match current {
        None if delta < Decimal::ZERO => Err(negative()),
        None if delta > max_amount() => Err(overflow()),
        None => Ok(Balance::opened(key.clone(), delta, at)),
        Some(balance) => {
            let amount = balance
                .amount
                .checked_add(delta)
                .filter(|amount| *amount <= max_amount())
                .ok_or_else(overflow)?;
            if amount < Decimal::ZERO {
                return Err(negative());
            }
            Ok(Balance {
                amount,
                updated_at: at.max(balance.updated_at),
                ..balance
            })
        }
    }
}
