//! User rows for the in-memory store
//!
//! Identifiers come from an atomic counter starting at 1. Email uniqueness is
//! claimed through a second map so two concurrent inserts with the same email
//! cannot both succeed.

use crate::store::StoreError;
use crate::types::{NewUser, User, UserId};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug)]
pub struct UserTable {
    rows: DashMap<UserId, User>,
    emails: DashMap<String, UserId>,
    next_id: AtomicI64,
}

impl Default for UserTable {
    fn default() -> Self {
        Self::new()
    }
}

impl UserTable {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            emails: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Insert a user, failing with `UniqueViolation` on a taken email
    pub fn insert(&self, user: &NewUser, created_at: DateTime<Utc>) -> Result<User, StoreError> {
        let id = match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::UniqueViolation {
                    entity: "user",
                    key: user.email.clone(),
                })
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                vacant.insert(id);
                id
            }
        };

        let row = User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            age: user.age,
            created_at,
        };
        self.rows.insert(id, row.clone());
        Ok(row)
    }

    pub fn get(&self, id: UserId) -> Option<User> {
        self.rows.get(&id).map(|row| row.value().clone())
    }

    pub fn exists(&self, id: UserId) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
