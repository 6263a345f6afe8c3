//! Rows of the accounts and transactions tables.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub address: String,
    /// Public-key encoded identity (ss58 style string).
    pub identity: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: i64,
    pub address: String,
    /// Positive for deposits, zero or negative for withdrawals.
    pub amount: i64,
    pub time: i64,
}

impl Transaction {
    pub fn is_deposit(&self) -> bool {
        self.amount > 0
    }
}

/// Canonical spelling of a hex account address: `0x` followed by lowercase
/// digits. Input that is not hex comes back trimmed but otherwise unchanged.
pub fn canonical_address(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        format!("0x{}", digits.to_ascii_lowercase())
    } else {
        trimmed.to_string()
    }
}

/// A history row before the store has assigned it a local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub address: String,
    pub amount: i64,
    pub time: i64,
}
