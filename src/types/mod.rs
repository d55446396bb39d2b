//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `balance`: Balance rows and their (user, currency) key
//! - `transaction`: Transaction records, requests and identifiers
//! - `user`: Ledger users
//! - `error`: Error types for the ledger engine

pub mod balance;
pub mod error;
pub mod transaction;
pub mod user;

pub use balance::{Balance, BalanceKey};
pub use error::{ErrorClass, LedgerError};
pub use transaction::{
    max_amount, Transaction, TransactionId, TransactionRequest, TransactionType, UserId,
    AMOUNT_SCALE,
};
pub use user::{NewUser, User};
