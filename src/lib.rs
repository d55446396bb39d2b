//! Rust Ledger Engine Library
//! # Overview
//!
//! A minimal multi-currency ledger: users hold balances in several
//! currencies, and deposits and withdrawals mutate those balances. Every
//! transaction is applied as one atomic unit (ledger insert + balance
//! adjustment), no balance ever goes below zero, and no transaction ID is
//! ever applied twice.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (User, Balance, Transaction, LedgerError)
//! - [`store`] - Storage seam (`LedgerStore`, `UnitOfWork`) and its backends:
//!   - [`store::memory`] - sharded in-process tables with per-row locks
//!   - [`store::sqlite`] - SQLite via sqlx, invariants held by constraints
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - `LedgerEngine`, the transactional coordinator
//!   - [`core::validation`] - field rules checked before any write
//! - [`io`] - CSV replay input and balance output
//! - [`runner`] - replay and load-test drivers
//! - [`cli`], [`config`], [`telemetry`] - arguments, settings and logging
//!
//! # Transaction Types
//!
//! - **Deposit**: Credit funds, creating the balance on first use
//! - **Withdrawal**: Debit funds; rejected if the balance would go negative
//!
//! # Errors
//!
//! Callers only ever see [`LedgerError`]. Its [`ErrorClass`] tells an outer
//! surface whether the caller, the current state, or the server is at fault.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod runner;
pub mod store;
pub mod telemetry;
pub mod types;

pub use config::{LedgerConfig, LoadTestConfig, SqliteConfig, StoreKind};
pub use core::{AttemptState, LedgerEngine};
pub use io::write_balances_csv;
pub use store::{AnyStore, LedgerStore, MemoryStore, SqliteStore, StoreError, UnitOfWork};
pub use types::{
    max_amount, Balance, BalanceKey, ErrorClass, LedgerError, NewUser, Transaction,
    TransactionId, TransactionRequest, TransactionType, User, UserId,
};
