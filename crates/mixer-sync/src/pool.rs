//! Withdrawal-pool stream: keeps the spendable amount and the ticket pool in
//! step with the program's output log.

use async_trait::async_trait;
use mixer_store::{Store, StreamKey};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::engine::MixingEngine;
use crate::error::SyncError;
use crate::ledger::{
    decode_outputs, decode_reply, same_identity, EventKind, LedgerEvent, LedgerReader, StateQuery,
    SyncConfig,
};
use crate::stream::StreamCycle;
use crate::tickets::TicketLock;

/// UI-facing gauges fed by the pool stream.
#[derive(Debug)]
pub struct PoolGauges {
    amount: watch::Sender<u64>,
    anonymity_set: watch::Sender<u64>,
}

impl PoolGauges {
    pub fn new() -> Self {
        Self {
            amount: watch::channel(0).0,
            anonymity_set: watch::channel(0).0,
        }
    }

    pub fn amount(&self) -> watch::Receiver<u64> {
        self.amount.subscribe()
    }

    pub fn anonymity_set(&self) -> watch::Receiver<u64> {
        self.anonymity_set.subscribe()
    }

    /// Returns true if the value changed.
    pub fn set_amount(&self, value: u64) -> bool {
        set_if_changed(&self.amount, value)
    }

    pub fn set_anonymity_set(&self, value: u64) -> bool {
        set_if_changed(&self.anonymity_set, value)
    }

    pub fn current_amount(&self) -> u64 {
        *self.amount.borrow()
    }

    pub fn current_anonymity_set(&self) -> u64 {
        *self.anonymity_set.borrow()
    }
}

impl Default for PoolGauges {
    fn default() -> Self {
        Self::new()
    }
}

fn set_if_changed(sender: &watch::Sender<u64>, value: u64) -> bool {
    sender.send_if_modified(|current| {
        if *current == value {
            return false;
        }
        *current = value;
        true
    })
}

pub struct WithdrawalPoolCycle {
    key: StreamKey,
    config: SyncConfig,
    ledger: Arc<dyn LedgerReader>,
    engine: Arc<dyn MixingEngine>,
    store: Store,
    tickets: TicketLock,
    gauges: Arc<PoolGauges>,
}

impl WithdrawalPoolCycle {
    pub fn new(
        config: SyncConfig,
        ledger: Arc<dyn LedgerReader>,
        engine: Arc<dyn MixingEngine>,
        store: Store,
        tickets: TicketLock,
        gauges: Arc<PoolGauges>,
    ) -> Self {
        Self {
            key: StreamKey::WithdrawalPool,
            config,
            ledger,
            engine,
            store,
            tickets,
            gauges,
        }
    }

    async fn refresh_anonymity_set(&self) -> Result<(), SyncError> {
        let raw = self
            .ledger
            .read(&self.config.pool_program, &StateQuery::LeavesLen {})
            .await?;
        let size: u64 = decode_reply(raw)?;
        if self.gauges.set_anonymity_set(size) {
            self.store.set_cached_anonymity_set(size).await?;
            debug!(size, "anonymity set changed");
        }
        Ok(())
    }
}

#[async_trait]
impl StreamCycle for WithdrawalPoolCycle {
    fn key(&self) -> &StreamKey {
        &self.key
    }

    fn event_kind(&self) -> EventKind {
        EventKind::StateChanged
    }

    fn watches(&self, event: &LedgerEvent) -> bool {
        match event {
            LedgerEvent::StateChanged { changed } => changed
                .iter()
                .any(|id| same_identity(id, &self.config.pool_program)),
            _ => false,
        }
    }

    async fn activate(&self) -> Result<(), SyncError> {
        if let Some(amount) = self.store.cached_pool_amount().await? {
            self.gauges.set_amount(amount);
        }
        if let Some(size) = self.store.cached_anonymity_set().await? {
            self.gauges.set_anonymity_set(size);
        }
        Ok(())
    }

    async fn run(&self, cursor: u64) -> Result<u64, SyncError> {
        self.refresh_anonymity_set().await?;

        let raw = self
            .ledger
            .read(&self.config.pool_program, &StateQuery::Withdrawn { from: cursor })
            .await?;
        let outputs: Vec<String> = decode_reply(raw)?;
        let outputs = decode_outputs(&outputs)?;

        let _tickets = self.tickets.lock().await;
        let verdict = self.engine.verify_and_consume(&outputs).await?;
        let next = cursor + outputs.len() as u64;
        let applied = self
            .store
            .apply_pool(&self.key, &verdict.consumed, verdict.amount, next)
            .await?;

        if self.gauges.set_amount(verdict.amount) {
            info!(amount = verdict.amount, "spendable amount changed");
        }
        debug!(
            fetched = outputs.len(),
            consumed = applied.rows,
            cursor = applied.cursor,
            "pool cycle applied"
        );
        Ok(applied.cursor)
    }
}
