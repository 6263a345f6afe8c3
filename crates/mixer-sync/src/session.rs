//! Entry flow: passphrase check, pool-program selection, engine activation.
//!
//! Switching to a different pool program invalidates every cursor, ticket
//! and history row. The engine is activated with an empty ticket pool in that
//! case, and the ledger-derived tables are reset only once it accepted.

use mixer_core::credential::CredentialGate;
use mixer_store::{Store, StoreError};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::engine::MixingEngine;
use crate::error::SyncError;
use crate::ledger::{LedgerId, SyncConfig};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("incorrect passphrase")]
    WrongPassphrase,

    #[error("no pool program configured; pass one explicitly")]
    MissingProgram,

    #[error("invalid pool program identity {0:?}")]
    InvalidProgram(String),

    #[error("engine activation failed: {0}")]
    Activation(SyncError),

    #[error("storage: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub config: SyncConfig,
    /// Whether the ledger state is reset for a new pool program.
    pub program_changed: bool,
}

/// Full login: unlock, hand the accounts and tickets to the engine, then
/// commit the program choice.
pub async fn login(
    gate: &CredentialGate,
    store: &Store,
    engine: &dyn MixingEngine,
    passphrase: &str,
    program: Option<&str>,
) -> Result<Session, SessionError> {
    let session = unlock(gate, store, passphrase, program).await?;

    let addresses: Vec<String> = store
        .get_accounts()
        .await?
        .into_iter()
        .map(|account| account.address)
        .collect();
    let tickets = if session.program_changed {
        BTreeSet::new()
    } else {
        store.list_index_tickets().await?
    };
    engine
        .activate_accounts(&addresses, passphrase, &tickets, &session.config.pool_program)
        .await
        .map_err(SessionError::Activation)?;

    commit(store, &session).await?;
    info!(
        program = %session.config.pool_program,
        accounts = addresses.len(),
        tickets = tickets.len(),
        "session opened"
    );
    Ok(session)
}

/// Checks the passphrase and resolves the pool program without writing
/// anything.
pub async fn unlock(
    gate: &CredentialGate,
    store: &Store,
    passphrase: &str,
    program: Option<&str>,
) -> Result<Session, SessionError> {
    if !verify_off_runtime(gate, passphrase).await {
        warn!("login rejected");
        return Err(SessionError::WrongPassphrase);
    }

    let settings = store.load_settings().await?;
    let saved = match settings.pool_program.as_deref() {
        Some(raw) => Some(parse_program(raw)?),
        None => None,
    };
    let requested = match program.filter(|p| !p.trim().is_empty()) {
        Some(raw) => Some(parse_program(raw.trim())?),
        None => None,
    };

    let (pool_program, program_changed) = match (requested, saved) {
        (Some(req), Some(saved)) => (req, req != saved),
        (Some(req), None) => (req, true),
        (None, Some(saved)) => (saved, false),
        (None, None) => return Err(SessionError::MissingProgram),
    };

    Ok(Session {
        config: SyncConfig { pool_program },
        program_changed,
    })
}

/// Persists the program chosen by [`unlock`], resetting ledger state if it
/// changed.
pub async fn commit(store: &Store, session: &Session) -> Result<(), SessionError> {
    if !session.program_changed {
        return Ok(());
    }
    store.reset_ledger_state().await?;
    let mut settings = store.load_settings().await?;
    settings.pool_program = Some(session.config.pool_program.to_hex());
    store.save_settings(&settings).await?;
    info!(program = %session.config.pool_program, "pool program switched");
    Ok(())
}

/// Runs the 100k-round key derivation on the blocking pool.
async fn verify_off_runtime(gate: &CredentialGate, passphrase: &str) -> bool {
    let gate = gate.clone();
    let passphrase = Zeroizing::new(passphrase.to_string());
    match tokio::task::spawn_blocking(move || gate.verify(&passphrase)).await {
        Ok(ok) => ok,
        Err(err) => {
            warn!(error = %err, "passphrase check did not complete");
            false
        }
    }
}

fn parse_program(raw: &str) -> Result<LedgerId, SessionError> {
    raw.parse()
        .map_err(|_| SessionError::InvalidProgram(raw.to_string()))
}
