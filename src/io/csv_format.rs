//! CSV format handling for replay input and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to replay records
//! - Balance output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{Balance, TransactionRequest, TransactionType, UserId};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Client identifier used in replay files
///
/// Clients are mapped onto ledger users the first time they appear.
pub type ClientId = u32;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns: type, client, tx, currency, amount
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub tx_type: String,
    pub client: ClientId,
    pub tx: String,
    pub currency: String,
    pub amount: Option<String>,
}

/// A parsed replay row, not yet bound to a ledger user
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRecord {
    pub tx_type: TransactionType,
    pub client: ClientId,
    pub tx: String,
    pub currency: String,
    pub amount: Decimal,
}

impl ReplayRecord {
    /// Build the engine request once the client's user ID is known
    pub fn into_request(self, user_id: UserId) -> TransactionRequest {
        TransactionRequest {
            id: self.tx,
            user_id,
            currency: self.currency,
            amount: self.amount,
            tx_type: self.tx_type,
        }
    }
}

/// Convert a CsvRecord to a ReplayRecord
///
/// This function:
/// - Parses the transaction type string into a TransactionType enum
/// - Parses the amount string into a Decimal
///
/// Range and precision of the amount are not checked here; the engine
/// rejects those as invalid input so they count as rejected, not malformed.
///
/// # Returns
///
/// Result containing either:
/// - Ok(ReplayRecord) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<ReplayRecord, String> {
    let tx_type = TransactionType::from_str(&csv_record.tx_type)
        .map_err(|e| format!("Invalid transaction type for tx {}: {}", csv_record.tx, e))?;

    let amount = match csv_record.amount {
        Some(amount_str) if !amount_str.trim().is_empty() => Decimal::from_str(amount_str.trim())
            .map_err(|_| format!("Invalid amount '{}' for tx {}", amount_str, csv_record.tx))?,
        _ => {
            return Err(format!(
                "{} transaction {} for client {} requires an amount",
                tx_type, csv_record.tx, csv_record.client
            ))
        }
    };

    Ok(ReplayRecord {
        tx_type,
        client: csv_record.client,
        tx: csv_record.tx,
        currency: csv_record.currency,
        amount,
    })
}

/// Write balances to CSV format
///
/// Writes one row per (client, currency) with columns: client, currency, amount.
/// Rows are sorted by client then currency for deterministic output, and
/// amounts are printed with four decimal places.
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_balances_csv(
    balances: &[(ClientId, Balance)],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["client", "currency", "amount"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&(ClientId, Balance)> = balances.iter().collect();
    sorted.sort_by(|a, b| (a.0, &a.1.currency).cmp(&(b.0, &b.1.currency)));

    for (client, balance) in sorted {
        writer
            .write_record(&[
                client.to_string(),
                balance.currency.clone(),
                format!("{:.4}", balance.amount),
            ])
            .map_err(|e| format!("Failed to write balance record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
