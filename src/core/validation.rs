//! Request validation
//!
//! Every check here runs before the engine touches storage, so a request that
//! fails validation never opens a unit of work.

use crate::types::{LedgerError, NewUser, TransactionRequest, UserId, AMOUNT_SCALE};
use rust_decimal::Decimal;

pub use crate::types::max_amount;

/// Longest accepted transaction ID, in characters
pub const MAX_TRANSACTION_ID_LEN: usize = 128;

/// Longest accepted currency code
pub const MAX_CURRENCY_LEN: usize = 16;

/// Longest accepted user name, in characters
pub const MAX_NAME_LEN: usize = 255;

/// Validate a transaction request
pub fn validate_transaction(request: &TransactionRequest) -> Result<(), LedgerError> {
    validate_transaction_id(&request.id)?;
    validate_user_id(request.user_id)?;
    validate_currency(&request.currency)?;
    validate_amount(request.amount)
}

pub fn validate_transaction_id(id: &str) -> Result<(), LedgerError> {
    if id.is_empty() {
        return Err(LedgerError::invalid_input("id", "must not be empty"));
    }
    if id.chars().count() > MAX_TRANSACTION_ID_LEN {
        return Err(LedgerError::invalid_input(
            "id",
            format!("must be at most {MAX_TRANSACTION_ID_LEN} characters"),
        ));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LedgerError::invalid_input(
            "id",
            "must not contain whitespace or control characters",
        ));
    }
    Ok(())
}

pub fn validate_user_id(user_id: UserId) -> Result<(), LedgerError> {
    if user_id <= 0 {
        return Err(LedgerError::invalid_input(
            "user_id",
            "must be a positive integer",
        ));
    }
    Ok(())
}

/// Currency codes are case-sensitive: `usd` and `USD` are different balances
pub fn validate_currency(currency: &str) -> Result<(), LedgerError> {
    if currency.is_empty() {
        return Err(LedgerError::invalid_input("currency", "must not be empty"));
    }
    if currency.len() > MAX_CURRENCY_LEN {
        return Err(LedgerError::invalid_input(
            "currency",
            format!("must be at most {MAX_CURRENCY_LEN} characters"),
        ));
    }
    if !currency.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LedgerError::invalid_input(
            "currency",
            "must contain only ASCII letters and digits",
        ));
    }
    Ok(())
}

/// Amounts are strictly positive, have at most four fractional digits and
/// stay within [`max_amount`]
pub fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_input(
            "amount",
            "must be greater than zero",
        ));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::invalid_input(
            "amount",
            format!("must have at most {AMOUNT_SCALE} decimal places"),
        ));
    }
    if amount > max_amount() {
        return Err(LedgerError::invalid_input(
            "amount",
            format!("must not exceed {}", max_amount()),
        ));
    }
    Ok(())
}

/// Validate a new user; `name` is checked after trimming
pub fn validate_new_user(user: &NewUser) -> Result<(), LedgerError> {
    let name = user.name.trim();
    if name.is_empty() {
        return Err(LedgerError::invalid_input("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(LedgerError::invalid_input(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    validate_email(&user.email)?;
    if user.age <= 0 {
        return Err(LedgerError::invalid_input("age", "must be greater than zero"));
    }
    Ok(())
}

/// Structural email check: `local@domain.tld`, no whitespace
pub fn validate_email(email: &str) -> Result<(), LedgerError> {
    let invalid = || LedgerError::invalid_input("email", format!("'{email}' is not a valid address"));

    if email.is_empty() {
        return Err(LedgerError::invalid_input("email", "must not be empty"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels_ok = domain.split('.').all(|label| !label.is_empty());
    if !domain.contains('.') || !labels_ok {
        return Err(invalid());
    }
    Ok(())
}
