//! Account creation, import and export.
//!
//! Keys live in the mixing engine; the store keeps the address, encoded
//! identity and display name so the account list survives restarts.

use mixer_store::{Account, StoreError, Transaction};
use tracing::info;

use crate::error::SyncError;
use crate::ledger::LedgerId;
use crate::synchronizer::Synchronizer;

impl Synchronizer {
    /// Generates a new account in the engine and records it under `name`.
    pub async fn create_account(&self, name: &str) -> Result<Account, SyncError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::InvalidAccount("name must not be empty".into()));
        }
        let issued = self.engine.create_account().await?;
        let account = Account {
            address: canonical(&issued.address)?,
            identity: issued.identity,
            name: name.to_string(),
        };
        self.record(&account).await?;
        info!(address = %account.address, "account created");
        Ok(account)
    }

    /// Imports an account exported by [`export_account`](Self::export_account).
    pub async fn import_account(&self, encoded: &str, password: &str) -> Result<Account, SyncError> {
        let mut account = self.engine.import_account(encoded, password).await?;
        account.address = canonical(&account.address)?;
        self.record(&account).await?;
        info!(address = %account.address, "account imported");
        Ok(account)
    }

    pub async fn export_account(&self, address: &str) -> Result<String, SyncError> {
        let address = canonical(address)?;
        let account = self
            .store
            .get_account(&address)
            .await?
            .ok_or_else(|| SyncError::UnknownAccount(address.clone()))?;
        self.engine.export_account(&account.address, &account.name).await
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, SyncError> {
        Ok(self.store.get_accounts().await?)
    }

    pub async fn history(&self, address: &str) -> Result<Vec<Transaction>, SyncError> {
        Ok(self.store.get_transactions(&canonical(address)?).await?)
    }

    async fn record(&self, account: &Account) -> Result<(), SyncError> {
        match self.store.add_account(account).await {
            Err(StoreError::AlreadyExists(address)) => Err(SyncError::AccountExists(address)),
            other => Ok(other?),
        }
    }
}

fn canonical(address: &str) -> Result<String, SyncError> {
    Ok(address.parse::<LedgerId>()?.to_hex())
}
