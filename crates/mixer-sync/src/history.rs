//! Per-account history stream.

use async_trait::async_trait;
use mixer_store::{NewTransaction, Store, StreamKey};
use std::sync::Arc;
use tracing::debug;

use crate::error::SyncError;
use crate::ledger::{
    decode_reply, same_identity, EventKind, HistoryEntry, LedgerEvent, LedgerId, LedgerReader,
    StateQuery, SyncConfig,
};
use crate::stream::StreamCycle;

pub struct AccountHistoryCycle {
    key: StreamKey,
    address: String,
    account: LedgerId,
    config: SyncConfig,
    ledger: Arc<dyn LedgerReader>,
    store: Store,
}

impl AccountHistoryCycle {
    /// Rows and the cursor are keyed by the canonical hex of `account`, so
    /// every spelling of one address shares one stream.
    pub fn new(
        account: LedgerId,
        config: SyncConfig,
        ledger: Arc<dyn LedgerReader>,
        store: Store,
    ) -> Self {
        let address = account.to_hex();
        Self {
            key: StreamKey::AccountHistory(address.clone()),
            address,
            account,
            config,
            ledger,
            store,
        }
    }

    fn to_row(&self, entry: HistoryEntry) -> Result<NewTransaction, SyncError> {
        let time = i64::try_from(entry.time)
            .map_err(|_| SyncError::MalformedResponse(format!("history time {} out of range", entry.time)))?;
        Ok(NewTransaction {
            address: self.address.clone(),
            amount: entry.amount,
            time,
        })
    }
}

#[async_trait]
impl StreamCycle for AccountHistoryCycle {
    fn key(&self) -> &StreamKey {
        &self.key
    }

    fn event_kind(&self) -> EventKind {
        EventKind::MessageDelivered
    }

    /// Only messages the pool program sends to this account.
    fn watches(&self, event: &LedgerEvent) -> bool {
        match event {
            LedgerEvent::MessageDelivered {
                source,
                destination,
            } => {
                same_identity(destination, &self.account)
                    && same_identity(source, &self.config.pool_program)
            }
            _ => false,
        }
    }

    async fn run(&self, cursor: u64) -> Result<u64, SyncError> {
        let query = StateQuery::HistoryOneFrom {
            user: self.account,
            from: cursor,
        };
        let raw = self.ledger.read(&self.config.pool_program, &query).await?;
        let entries: Vec<HistoryEntry> = decode_reply(raw)?;
        let batch = entries
            .into_iter()
            .map(|entry| self.to_row(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let next = cursor + batch.len() as u64;
        let applied = self.store.apply_history(&self.key, &batch, next).await?;
        debug!(
            stream = %self.key,
            appended = applied.rows,
            cursor = applied.cursor,
            "history cycle applied"
        );
        Ok(applied.cursor)
    }
}
