//! I/O module
//!
//! Handles CSV parsing and output for the replay command.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, balance serialization)
//! - `reader` - Streaming replay reader with iterator interface

pub mod csv_format;
pub mod reader;

pub use csv_format::{convert_csv_record, write_balances_csv, ClientId, CsvRecord, ReplayRecord};
pub use reader::ReplayReader;
