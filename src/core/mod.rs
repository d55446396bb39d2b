//! Core business logic module
//!
//! This module contains the ledger coordinator and its input rules:
//! - `engine` - `LedgerEngine`, the atomic balance-mutation procedure
//! - `validation` - field checks applied before any storage access

pub mod engine;
pub mod validation;

pub use engine::{AttemptState, LedgerEngine};
