//! User types for the ledger

use super::transaction::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered ledger user
///
/// Owns zero or more balances and transactions through their `user_id`
/// column. Users are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user; the identifier is assigned by the store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: i32,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: i32) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age,
        }
    }
}
