use tracing::info;

use crate::{
    db::Store,
    error::StoreError,
    models::{canonical_address, Account},
};

impl Store {
    /// Inserts `account` under its canonical address; an address that is
    /// already present, in any spelling, is a conflict.
    pub async fn add_account(&self, account: &Account) -> Result<(), StoreError> {
        let address = canonical_address(&account.address);
        let res = sqlx::query(
            "INSERT INTO accounts (address, identity, name) VALUES (?, ?, ?) \
             ON CONFLICT(address) DO NOTHING",
        )
        .bind(&address)
        .bind(&account.identity)
        .bind(&account.name)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(address));
        }
        info!(%address, "account added");
        Ok(())
    }

    pub async fn get_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query_as::<_, Account>(
            "SELECT address, identity, name FROM accounts ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_account(&self, address: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, Account>(
            "SELECT address, identity, name FROM accounts WHERE address = ?",
        )
        .bind(canonical_address(address))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
