//! Error types for the ledger engine
//!
//! `LedgerError` is the only error callers of the engine ever see. Storage
//! failures are translated into it at the store/engine boundary, so the raw
//! backend text never leaks through `Display`.
//!
//! # Error Categories
//!
//! - **Validation**: malformed or out-of-range request fields
//! - **Lookup**: unknown user, balance or transaction
//! - **Conflict**: duplicate transaction ID, duplicate email, insufficient funds
//! - **Server**: storage failures and expired deadlines

use super::transaction::UserId;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// A request field is malformed or out of range
    ///
    /// Always detected before any storage write.
    #[error("Invalid {field}: {reason}")]
    InvalidInput {
        /// Name of the offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Unknown user, balance or transaction
    #[error("{entity} {key} not found")]
    NotFound {
        /// Kind of entity that was looked up
        entity: String,
        /// Lookup key, rendered for humans
        key: String,
    },

    /// The transaction ID was already used (idempotency gate)
    #[error("Transaction {id} already exists")]
    DuplicateTransaction {
        /// The reused transaction ID
        id: String,
    },

    /// Another user is registered with this email
    #[error("User with email {email} already exists")]
    DuplicateEmail {
        /// The conflicting email
        email: String,
    },

    /// The adjustment would take the balance below zero
    ///
    /// The attempted transaction is rolled back; the balance is unchanged.
    #[error("Insufficient funds for user {user_id} in {currency}: requested {requested}")]
    InsufficientFunds {
        /// Owner of the balance
        user_id: UserId,
        /// Currency of the balance
        currency: String,
        /// Amount of the rejected withdrawal
        requested: Decimal,
    },

    /// The attempt did not finish before its deadline and was rolled back
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Operation that was cancelled
        operation: String,
        /// Configured deadline
        after: Duration,
    },

    /// Storage or connectivity failure
    ///
    /// Carries the operation and entity only; the backend detail is logged.
    #[error("Internal error during {operation} on {entity}")]
    Internal {
        /// Operation that failed
        operation: String,
        /// Entity the operation touched
        entity: String,
    },
}

/// Response class the transport layer maps each error to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller sent something wrong (validation, unknown entity)
    Client,
    /// Request was well-formed but conflicts with current state
    Conflict,
    /// Failure on our side
    Server,
}

impl LedgerError {
    /// Classify this error for the outer surface
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::InvalidInput { .. } | LedgerError::NotFound { .. } => ErrorClass::Client,
            LedgerError::DuplicateTransaction { .. }
            | LedgerError::DuplicateEmail { .. }
            | LedgerError::InsufficientFunds { .. } => ErrorClass::Conflict,
            LedgerError::Timeout { .. } | LedgerError::Internal { .. } => ErrorClass::Server,
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a NotFound error
    pub fn not_found(entity: &str, key: impl ToString) -> Self {
        LedgerError::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    /// Create a DuplicateTransaction error
    pub fn duplicate_transaction(id: &str) -> Self {
        LedgerError::DuplicateTransaction { id: id.to_string() }
    }

    /// Create a DuplicateEmail error
    pub fn duplicate_email(email: &str) -> Self {
        LedgerError::DuplicateEmail {
            email: email.to_string(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(user_id: UserId, currency: &str, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            user_id,
            currency: currency.to_string(),
            requested,
        }
    }

    /// Create a Timeout error
    pub fn timeout(operation: &str, after: Duration) -> Self {
        LedgerError::Timeout {
            operation: operation.to_string(),
            after,
        }
    }

    /// Create an Internal error
    pub fn internal(operation: &str, entity: impl ToString) -> Self {
        LedgerError::Internal {
            operation: operation.to_string(),
            entity: entity.to_string(),
        }
    }
}
