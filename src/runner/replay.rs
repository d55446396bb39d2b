//! CSV replay through the ledger engine
//!
//! Reads a replay file row by row and applies each row with
//! `create_transaction`, in file order. Every distinct client in the file is
//! registered as a ledger user the first time it appears.
//!
//! Rows are classified as:
//! - **applied** - committed by the engine
//! - **rejected** - well-formed but refused by the engine (insufficient funds,
//!   duplicate ID, invalid amount or currency)
//! - **malformed** - could not be parsed; skipped
//!
//! Rejected and malformed rows are logged and never stop the replay. Only a
//! storage failure or an unreadable file aborts it.

use crate::core::LedgerEngine;
use crate::io::{ClientId, ReplayReader};
use crate::store::LedgerStore;
use crate::types::{Balance, ErrorClass, LedgerError, NewUser, UserId};
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Age recorded for users created from replay clients
const REPLAY_USER_AGE: i32 = 18;

/// Row counts of one replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub rejected: usize,
    pub malformed: usize,
}

/// Result of a replay: counts plus every final balance keyed by client
#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    pub summary: ReplaySummary,
    pub balances: Vec<(ClientId, Balance)>,
}

/// Synthetic user registered for a replay client
pub fn replay_user(client: ClientId) -> NewUser {
    NewUser::new(
        format!("client-{client}"),
        format!("client-{client}@replay.invalid"),
        REPLAY_USER_AGE,
    )
}

/// Replay `input` through `engine`
pub async fn replay<S: LedgerStore>(
    engine: &LedgerEngine<S>,
    input: &Path,
) -> anyhow::Result<ReplayOutcome> {
    let reader = ReplayReader::new(input).map_err(anyhow::Error::msg)?;
    let mut users: HashMap<ClientId, UserId> = HashMap::new();
    let mut summary = ReplaySummary::default();

    for row in reader {
        let record = match row {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed row");
                summary.malformed += 1;
                continue;
            }
        };

        let user_id = match users.get(&record.client) {
            Some(user_id) => *user_id,
            None => {
                let user_id = register_client(engine, record.client).await?;
                users.insert(record.client, user_id);
                user_id
            }
        };

        let tx_id = record.tx.clone();
        match engine.create_transaction(record.into_request(user_id)).await {
            Ok(_) => summary.applied += 1,
            Err(e) if e.class() == ErrorClass::Server => {
                return Err(e).with_context(|| format!("storage failure while applying tx {tx_id}"));
            }
            Err(e) => {
                warn!(tx = %tx_id, error = %e, "transaction rejected");
                summary.rejected += 1;
            }
        }
    }

    let mut clients: Vec<_> = users.into_iter().collect();
    clients.sort_unstable();

    let mut balances = Vec::new();
    for (client, user_id) in clients {
        let rows = engine
            .list_balances(user_id)
            .await
            .with_context(|| format!("failed to read balances of client {client}"))?;
        balances.extend(rows.into_iter().map(|balance| (client, balance)));
    }

    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "replay finished"
    );
    Ok(ReplayOutcome { summary, balances })
}

async fn register_client<S: LedgerStore>(
    engine: &LedgerEngine<S>,
    client: ClientId,
) -> anyhow::Result<UserId> {
    match engine.create_user(replay_user(client)).await {
        Ok(user) => Ok(user.id),
        Err(LedgerError::DuplicateEmail { email }) => bail!(
            "client {client} is already registered as {email}; replay into an empty store"
        ),
        Err(e) => Err(e).with_context(|| format!("failed to register client {client}")),
    }
}
