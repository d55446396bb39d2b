//! Thread-safe transaction ledger for the in-memory store
//!
//! This module provides the `TransactionTable` struct, the append-only ledger
//! of committed transaction records.
//!
//! # Design
//!
//! Each transaction ID maps to a slot that is either `Pending` (reserved by a
//! committing unit, invisible to readers) or `Committed`. Reserving first and
//! publishing later lets a unit claim its IDs, fail on a later step, and
//! release them again without any reader ever seeing the record.
//!
//! A per-user index keeps IDs in commit order for `ListByUser`.
//!
//! # Thread Safety
//!
//! Uniqueness is decided by `DashMap::entry`, which holds the shard lock for
//! the duration of the vacant/occupied check and the insert. No method holds
//! an entry guard while touching another entry of the same map.

use crate::store::StoreError;
use crate::types::{Transaction, TransactionId, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone)]
enum Slot {
    Pending(Transaction),
    Committed(Transaction),
}

/// Append-only ledger keyed by transaction ID
#[derive(Debug, Default)]
pub struct TransactionTable {
    slots: DashMap<TransactionId, Slot>,

    /// Committed IDs per user, in commit order
    by_user: DashMap<UserId, Vec<TransactionId>>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            by_user: DashMap::new(),
        }
    }

    /// Committed transaction by ID
    pub fn get(&self, id: &str) -> Option<Transaction> {
        match self.slots.get(id)?.value() {
            Slot::Committed(transaction) => Some(transaction.clone()),
            Slot::Pending(_) => None,
        }
    }

    /// Whether the ID is committed or reserved by an in-flight commit
    pub fn is_taken(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Committed transactions of a user, in commit order
    pub fn for_user(&self, user_id: UserId) -> Vec<Transaction> {
        let ids = match self.by_user.get(&user_id) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Reserve every ID in `transactions` as pending
    ///
    /// All-or-nothing: if any ID is already taken, the reservations made by
    /// this call are released and `UniqueViolation` is returned.
    pub fn reserve(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        for (index, transaction) in transactions.iter().enumerate() {
            let reserved = match self.slots.entry(transaction.id.clone()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(Slot::Pending(transaction.clone()));
                    true
                }
                Entry::Occupied(_) => false,
            };
            if !reserved {
                self.release(&transactions[..index]);
                return Err(StoreError::UniqueViolation {
                    entity: "transaction",
                    key: transaction.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Drop pending reservations; committed slots are left untouched
    pub fn release(&self, transactions: &[Transaction]) {
        for transaction in transactions {
            self.slots
                .remove_if(&transaction.id, |_, slot| matches!(slot, Slot::Pending(_)));
        }
    }

    /// Turn reserved slots into committed records
    pub fn publish(&self, transactions: &[Transaction]) {
        for transaction in transactions {
            if let Some(mut slot) = self.slots.get_mut(&transaction.id) {
                *slot = Slot::Committed(transaction.clone());
            }
            self.by_user
                .entry(transaction.user_id)
                .or_default()
                .push(transaction.id.clone());
        }
    }

    /// Number of committed transactions
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Committed(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
