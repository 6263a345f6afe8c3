//! Atomic apply steps used by the synchronizer.
//!
//! Each helper writes the fetched data and advances the stream cursor in
//! one SQL transaction, so a crash leaves either both or neither.

use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::{
    cursors::{put_config, read_cursor, upsert_cursor, StreamKey, POOL_AMOUNT_KEY, POOL_ANONYMITY_SET_KEY},
    db::Store,
    error::StoreError,
    models::NewTransaction,
    tickets::delete_tickets,
    transactions::insert_transactions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Rows written (transactions appended or tickets removed).
    pub rows: u64,
    /// Cursor value stored after the apply.
    pub cursor: u64,
}

impl Store {
    /// Appends history rows for one account and advances its cursor.
    pub async fn apply_history(
        &self,
        key: &StreamKey,
        batch: &[NewTransaction],
        new_cursor: u64,
    ) -> Result<Applied, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows = insert_transactions(&mut tx, batch).await?;
        upsert_cursor(&mut tx, key, new_cursor).await?;
        let cursor = read_cursor(&mut tx, key).await?;
        tx.commit().await?;
        debug!(stream = %key, rows, cursor, "history applied");
        Ok(Applied { rows, cursor })
    }

    /// Drops consumed tickets, caches the spendable amount and advances the
    /// pool cursor.
    pub async fn apply_pool(
        &self,
        key: &StreamKey,
        consumed: &BTreeSet<u32>,
        amount: u64,
        new_cursor: u64,
    ) -> Result<Applied, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows = delete_tickets(&mut tx, consumed).await?;
        put_config(&mut tx, POOL_AMOUNT_KEY, &amount.to_string()).await?;
        upsert_cursor(&mut tx, key, new_cursor).await?;
        let cursor = read_cursor(&mut tx, key).await?;
        tx.commit().await?;
        debug!(stream = %key, rows, amount, cursor, "pool applied");
        Ok(Applied { rows, cursor })
    }

    pub async fn cached_pool_amount(&self) -> Result<Option<u64>, StoreError> {
        self.get_config_u64(POOL_AMOUNT_KEY).await
    }

    pub async fn set_cached_pool_amount(&self, amount: u64) -> Result<(), StoreError> {
        self.set_config(POOL_AMOUNT_KEY, &amount.to_string()).await
    }

    pub async fn cached_anonymity_set(&self) -> Result<Option<u64>, StoreError> {
        self.get_config_u64(POOL_ANONYMITY_SET_KEY).await
    }

    pub async fn set_cached_anonymity_set(&self, size: u64) -> Result<(), StoreError> {
        self.set_config(POOL_ANONYMITY_SET_KEY, &size.to_string()).await
    }

    /// Forgets everything derived from the pool program: tickets, history,
    /// cursors and cached gauges. Accounts and settings are kept.
    pub async fn reset_ledger_state(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM index_tickets").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM transactions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM stream_cursors").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM config WHERE key IN (?, ?)")
            .bind(POOL_AMOUNT_KEY)
            .bind(POOL_ANONYMITY_SET_KEY)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!("ledger state reset");
        Ok(())
    }
}
