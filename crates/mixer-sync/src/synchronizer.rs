//! Wires the stream instances together for one logged-in session.
//!
//! One `WithdrawalPool` stream runs for the whole session; an
//! `AccountHistory` stream runs per account the UI is currently showing.
//! Deposit allocation and pool import share the ticket lock with the pool
//! stream's apply step.

use mixer_store::{canonical_address, Store, StreamKey};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::engine::MixingEngine;
use crate::error::SyncError;
use crate::history::AccountHistoryCycle;
use crate::ledger::{LedgerId, LedgerReader, NotificationSource, SyncConfig};
use crate::pool::{PoolGauges, WithdrawalPoolCycle};
use crate::stream::{StreamHandle, StreamStatus};
use crate::tickets::TicketLock;

pub struct Synchronizer {
    config: SyncConfig,
    pub(crate) store: Store,
    ledger: Arc<dyn LedgerReader>,
    notifications: Arc<dyn NotificationSource>,
    pub(crate) engine: Arc<dyn MixingEngine>,
    tickets: TicketLock,
    gauges: Arc<PoolGauges>,
    pool: Option<StreamHandle>,
    histories: HashMap<String, StreamHandle>,
}

impl Synchronizer {
    pub fn new(
        config: SyncConfig,
        store: Store,
        ledger: Arc<dyn LedgerReader>,
        notifications: Arc<dyn NotificationSource>,
        engine: Arc<dyn MixingEngine>,
    ) -> Self {
        Self {
            config,
            store,
            ledger,
            notifications,
            engine,
            tickets: TicketLock::new(),
            gauges: Arc::new(PoolGauges::new()),
            pool: None,
            histories: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn tickets(&self) -> &TicketLock {
        &self.tickets
    }

    /// Activates the withdrawal-pool stream. A second call is a no-op.
    pub async fn start(&mut self) -> Result<(), SyncError> {
        if self.pool.is_some() {
            return Ok(());
        }
        let cycle = Arc::new(WithdrawalPoolCycle::new(
            self.config.clone(),
            self.ledger.clone(),
            self.engine.clone(),
            self.store.clone(),
            self.tickets.clone(),
            self.gauges.clone(),
        ));
        let handle = StreamHandle::activate(cycle, &self.store, self.notifications.as_ref()).await?;
        self.pool = Some(handle);
        info!(program = %self.config.pool_program, "synchronizer started");
        Ok(())
    }

    /// Activates the history stream for `address` if it is not running.
    /// Any hex spelling of the same account reuses the running stream.
    pub async fn watch_account(&mut self, address: &str) -> Result<(), SyncError> {
        let account: LedgerId = address.parse()?;
        let key = account.to_hex();
        if self.histories.contains_key(&key) {
            return Ok(());
        }
        let cycle = Arc::new(AccountHistoryCycle::new(
            account,
            self.config.clone(),
            self.ledger.clone(),
            self.store.clone(),
        ));
        let handle = StreamHandle::activate(cycle, &self.store, self.notifications.as_ref()).await?;
        self.histories.insert(key, handle);
        Ok(())
    }

    /// Stops the history stream for `address`, letting queued cycles apply.
    pub async fn unwatch_account(&mut self, address: &str) -> Option<StreamStatus> {
        let key = address.parse::<LedgerId>().ok()?.to_hex();
        match self.histories.remove(&key) {
            Some(handle) => Some(handle.deactivate().await),
            None => None,
        }
    }

    pub fn watched_accounts(&self) -> Vec<String> {
        self.histories.keys().cloned().collect()
    }

    pub fn status(&self, key: &StreamKey) -> Option<StreamStatus> {
        match key {
            StreamKey::WithdrawalPool => self.pool.as_ref().map(StreamHandle::status),
            StreamKey::AccountHistory(address) => {
                self.histories.get(&canonical_address(address)).map(StreamHandle::status)
            }
        }
    }

    pub fn watch_status(&self, key: &StreamKey) -> Option<watch::Receiver<StreamStatus>> {
        match key {
            StreamKey::WithdrawalPool => self.pool.as_ref().map(StreamHandle::watch_status),
            StreamKey::AccountHistory(address) => self
                .histories
                .get(&canonical_address(address))
                .map(StreamHandle::watch_status),
        }
    }

    /// Queues a refresh cycle on the pool stream.
    pub fn refresh_pool(&self) -> Result<(), SyncError> {
        self.pool.as_ref().ok_or(SyncError::Stopped)?.trigger()
    }

    pub fn spendable_amount(&self) -> watch::Receiver<u64> {
        self.gauges.amount()
    }

    pub fn anonymity_set_size(&self) -> watch::Receiver<u64> {
        self.gauges.anonymity_set()
    }

    /// Issues a deposit starting at the next free ticket and records the
    /// returned tickets.
    pub async fn deposit(&self, address: &str, amount: u32) -> Result<Vec<u32>, SyncError> {
        let _tickets = self.tickets.lock().await;
        let shift = self.next_shift().await?;
        let issued = self.engine.issue_deposit(address, amount, shift).await?;
        let added = self
            .store
            .add_index_tickets(&issued.iter().copied().collect::<BTreeSet<_>>())
            .await?;
        info!(%address, amount, shift, tickets = added, "deposit issued");
        Ok(issued)
    }

    pub async fn withdraw(&self, address: &str, amount: u32) -> Result<(), SyncError> {
        self.engine.issue_withdraw(address, amount).await?;
        info!(%address, amount, "withdrawal issued");
        Ok(())
    }

    /// Imports an exported pool bundle; returns the new amount and the
    /// tickets added.
    pub async fn import_pool(&self, encrypted: &str, password: &str) -> Result<(u64, Vec<u32>), SyncError> {
        let _tickets = self.tickets.lock().await;
        let shift = self.next_shift().await?;
        let (amount, issued) = self.engine.import_pool(encrypted, password, shift).await?;
        self.store
            .add_index_tickets(&issued.iter().copied().collect::<BTreeSet<_>>())
            .await?;
        self.store.set_cached_pool_amount(amount).await?;
        self.gauges.set_amount(amount);
        info!(amount, shift, tickets = issued.len(), "pool bundle imported");
        Ok((amount, issued))
    }

    /// First index after the pool's last one. Callers hold the ticket lock.
    async fn next_shift(&self) -> Result<u32, SyncError> {
        let last = self.store.last_index().await?;
        last.checked_add(1).ok_or(SyncError::TicketsExhausted(last))
    }

    pub async fn export_pool(&self, amount: u32) -> Result<String, SyncError> {
        let _tickets = self.tickets.lock().await;
        self.engine.export_pool(amount).await
    }

    /// Stops every stream. Queued cycles finish before this returns.
    pub async fn shutdown(&mut self) {
        for (address, handle) in self.histories.drain() {
            let status = handle.deactivate().await;
            if status.cycles_failed > 0 {
                warn!(%address, failed = status.cycles_failed, "history stream had failed cycles");
            }
        }
        if let Some(pool) = self.pool.take() {
            pool.deactivate().await;
        }
        info!("synchronizer stopped");
    }
}
