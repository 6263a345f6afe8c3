use sqlx::SqliteConnection;

use crate::{
    db::Store,
    error::StoreError,
    models::{canonical_address, NewTransaction, Transaction},
};

impl Store {
    /// Appends a batch of history rows. No deduplication is performed.
    pub async fn append_transactions(&self, batch: &[NewTransaction]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let appended = insert_transactions(&mut tx, batch).await?;
        tx.commit().await?;
        Ok(appended)
    }

    /// All rows for `address`, in insertion order.
    pub async fn get_transactions(&self, address: &str) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT id, address, amount, time FROM transactions WHERE address = ? ORDER BY id",
        )
        .bind(canonical_address(address))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

pub(crate) async fn insert_transactions(
    conn: &mut SqliteConnection,
    batch: &[NewTransaction],
) -> Result<u64, StoreError> {
    let mut appended = 0;
    for row in batch {
        appended += sqlx::query("INSERT INTO transactions (address, amount, time) VALUES (?, ?, ?)")
            .bind(canonical_address(&row.address))
            .bind(row.amount)
            .bind(row.time)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    Ok(appended)
}
