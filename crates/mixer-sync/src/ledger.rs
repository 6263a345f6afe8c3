//! The remote ledger as seen by the synchronizer.
//!
//! Only two capabilities are used: range reads of program state and
//! notification subscriptions. Notifications are triggers only; data is
//! always re-fetched with [`LedgerReader::read`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::SyncError;

pub const ID_LEN: usize = 32;

/// 32-byte identity of a program or account on the ledger, `0x`-hex on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedgerId([u8; ID_LEN]);

impl LedgerId {
    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for LedgerId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|_| SyncError::InvalidIdentity(s.to_string()))?;
        let bytes: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| SyncError::InvalidIdentity(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for LedgerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LedgerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Pool-program configuration injected into every stream instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub pool_program: LedgerId,
}

/// State queries understood by the pool program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StateQuery {
    Withdrawn { from: u64 },
    HistoryOneFrom { user: LedgerId, from: u64 },
    LeavesLen {},
}

/// One entry of an account's history as the program reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub amount: i64,
    pub time: u64,
}

#[derive(Deserialize)]
struct Reply<T> {
    res: T,
}

/// Unwraps a `{res: ...}` reply, rejecting any other shape.
pub fn decode_reply<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, SyncError> {
    serde_json::from_value::<Reply<T>>(value)
        .map(|reply| reply.res)
        .map_err(|e| SyncError::MalformedResponse(e.to_string()))
}

/// Decodes hex output identifiers from a `Withdrawn` reply.
pub fn decode_outputs(raw: &[String]) -> Result<Vec<[u8; ID_LEN]>, SyncError> {
    raw.iter()
        .map(|item| {
            let trimmed = item.strip_prefix("0x").unwrap_or(item);
            let bytes = hex::decode(trimmed)
                .map_err(|e| SyncError::MalformedResponse(format!("output {item:?}: {e}")))?;
            bytes
                .try_into()
                .map_err(|_| SyncError::MalformedResponse(format!("output {item:?}: wrong length")))
        })
        .collect()
}

#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn read(
        &self,
        program: &LedgerId,
        query: &StateQuery,
    ) -> Result<serde_json::Value, SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChanged,
    MessageDelivered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// Program states changed in the last block.
    StateChanged { changed: Vec<String> },
    /// A message was delivered from `source` to `destination`.
    MessageDelivered { source: String, destination: String },
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::StateChanged { .. } => EventKind::StateChanged,
            LedgerEvent::MessageDelivered { .. } => EventKind::MessageDelivered,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(LedgerEvent) + Send + Sync>;

/// Handle returned by a subscription. `cancel` must be idempotent.
pub trait Subscription: Send + Sync {
    fn cancel(&self);
}

#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn subscribe(
        &self,
        kind: EventKind,
        handler: EventHandler,
    ) -> Result<Box<dyn Subscription>, SyncError>;
}

/// True when `raw` names the same ledger identity as `id`.
pub fn same_identity(raw: &str, id: &LedgerId) -> bool {
    raw.parse::<LedgerId>().map(|parsed| parsed == *id).unwrap_or(false)
}
