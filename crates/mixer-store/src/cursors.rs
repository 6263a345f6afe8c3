//! Stream cursor registry and the generic config table.

use sqlx::SqliteConnection;
use std::fmt;

use crate::{db::Store, error::StoreError, models::canonical_address};

pub const POOL_AMOUNT_KEY: &str = "pool.amount";
pub const POOL_ANONYMITY_SET_KEY: &str = "pool.anonymity_set";

/// Identifies one logical remote stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamKey {
    WithdrawalPool,
    AccountHistory(String),
}

impl StreamKey {
    pub fn as_key(&self) -> String {
        match self {
            StreamKey::WithdrawalPool => "cursor.pool".to_string(),
            StreamKey::AccountHistory(address) => format!("cursor.history.{}", canonical_address(address)),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKey::WithdrawalPool => write!(f, "withdrawal-pool"),
            StreamKey::AccountHistory(address) => write!(f, "history:{address}"),
        }
    }
}

impl Store {
    /// Next unread position of `key`, 0 if never advanced.
    pub async fn cursor(&self, key: &StreamKey) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        read_cursor(&mut conn, key).await
    }

    /// Moves the cursor forward to `to`. A value behind the stored one is
    /// ignored; the returned value is what is stored afterwards.
    pub async fn advance_cursor(&self, key: &StreamKey, to: u64) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        upsert_cursor(&mut tx, key, to).await?;
        let stored = read_cursor(&mut tx, key).await?;
        tx.commit().await?;
        Ok(stored)
    }

    pub async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        put_config(&mut conn, key, value).await
    }

    pub async fn remove_config(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM config WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Numeric config value, e.g. a cached gauge.
    pub async fn get_config_u64(&self, key: &str) -> Result<Option<u64>, StoreError> {
        match self.get_config(key).await? {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| StoreError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                }),
            None => Ok(None),
        }
    }
}

pub(crate) async fn read_cursor(
    conn: &mut SqliteConnection,
    key: &StreamKey,
) -> Result<u64, StoreError> {
    let position: Option<i64> =
        sqlx::query_scalar("SELECT position FROM stream_cursors WHERE stream = ?")
            .bind(key.as_key())
            .fetch_optional(&mut *conn)
            .await?;
    match position {
        Some(p) => u64::try_from(p).map_err(|_| StoreError::InvalidValue {
            key: key.as_key(),
            value: p.to_string(),
        }),
        None => Ok(0),
    }
}

pub(crate) async fn upsert_cursor(
    conn: &mut SqliteConnection,
    key: &StreamKey,
    to: u64,
) -> Result<(), StoreError> {
    let to = i64::try_from(to).map_err(|_| StoreError::InvalidValue {
        key: key.as_key(),
        value: to.to_string(),
    })?;
    sqlx::query(
        "INSERT INTO stream_cursors (stream, position) VALUES (?, ?) \
         ON CONFLICT(stream) DO UPDATE SET position = MAX(position, excluded.position)",
    )
    .bind(key.as_key())
    .bind(to)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn put_config(
    conn: &mut SqliteConnection,
    key: &str,
    value: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO config (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
