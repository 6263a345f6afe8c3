//! The index-ticket pool.
//!
//! A set of distinct non-negative indices. `last_index` is the maximum
//! remaining index, or 0 when the pool is empty. Callers that read
//! `last_index` to pick the next free slot must hold the synchronizer's
//! ticket lock; the store itself does not serialise read-modify-write.

use sqlx::SqliteConnection;
use std::collections::BTreeSet;

use crate::{db::Store, error::StoreError};

impl Store {
    /// Adds indices to the pool. Indices already present are left alone.
    /// Returns how many were new.
    pub async fn add_index_tickets(&self, indices: &BTreeSet<u32>) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0;
        for idx in indices {
            added += sqlx::query("INSERT OR IGNORE INTO index_tickets (idx) VALUES (?)")
                .bind(i64::from(*idx))
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(added)
    }

    /// Removes indices from the pool. Returns how many were present.
    pub async fn remove_index_tickets(&self, indices: &BTreeSet<u32>) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let removed = delete_tickets(&mut tx, indices).await?;
        tx.commit().await?;
        Ok(removed)
    }

    pub async fn list_index_tickets(&self) -> Result<BTreeSet<u32>, StoreError> {
        let rows: Vec<i64> = sqlx::query_scalar("SELECT idx FROM index_tickets ORDER BY idx")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(to_index).collect()
    }

    pub async fn last_index(&self) -> Result<u32, StoreError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(idx) FROM index_tickets")
            .fetch_one(&self.pool)
            .await?;
        match max {
            Some(v) => to_index(v),
            None => Ok(0),
        }
    }
}

pub(crate) async fn delete_tickets(
    conn: &mut SqliteConnection,
    indices: &BTreeSet<u32>,
) -> Result<u64, StoreError> {
    let mut removed = 0;
    for idx in indices {
        removed += sqlx::query("DELETE FROM index_tickets WHERE idx = ?")
            .bind(i64::from(*idx))
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    Ok(removed)
}

fn to_index(v: i64) -> Result<u32, StoreError> {
    u32::try_from(v).map_err(|_| StoreError::InvalidValue {
        key: "index_tickets.idx".to_string(),
        value: v.to_string(),
    })
}
