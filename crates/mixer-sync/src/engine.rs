//! The opaque mixing capability. Key management, proof generation, note
//! bookkeeping and signing happen behind this trait; the synchronizer only
//! feeds it ledger data and records what it hands back.

use async_trait::async_trait;
use mixer_store::Account;
use std::collections::BTreeSet;

use crate::error::SyncError;
use crate::ledger::{LedgerId, ID_LEN};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolVerdict {
    /// Spendable amount after accounting for the outputs.
    pub amount: u64,
    /// Locally held tickets the outputs prove were consumed.
    pub consumed: BTreeSet<u32>,
}

/// Keys of a freshly generated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAccount {
    pub address: String,
    /// Public-key encoded identity (ss58 style string).
    pub identity: String,
}

#[async_trait]
pub trait MixingEngine: Send + Sync {
    /// Unlocks the engine for a session: the known account addresses, the
    /// local ticket pool and the pool program it should talk to.
    async fn activate_accounts(
        &self,
        addresses: &[String],
        password: &str,
        tickets: &BTreeSet<u32>,
        program: &LedgerId,
    ) -> Result<(), SyncError>;

    async fn create_account(&self) -> Result<IssuedAccount, SyncError>;

    /// Decrypts an exported account; the name comes from the export.
    async fn import_account(&self, encoded: &str, password: &str) -> Result<Account, SyncError>;

    async fn export_account(&self, address: &str, name: &str) -> Result<String, SyncError>;

    async fn verify_and_consume(&self, outputs: &[[u8; ID_LEN]]) -> Result<PoolVerdict, SyncError>;

    /// Issues a deposit whose notes start at index `shift`. Returns the
    /// indices that are now in flight.
    async fn issue_deposit(&self, address: &str, amount: u32, shift: u32) -> Result<Vec<u32>, SyncError>;

    async fn issue_withdraw(&self, address: &str, amount: u32) -> Result<(), SyncError>;

    /// Imports an exported pool bundle. Returns the new spendable amount and
    /// the indices added starting at `shift`.
    async fn import_pool(
        &self,
        encrypted: &str,
        password: &str,
        shift: u32,
    ) -> Result<(u64, Vec<u32>), SyncError>;

    async fn export_pool(&self, amount: u32) -> Result<String, SyncError>;
}
