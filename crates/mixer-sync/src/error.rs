use mixer_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport or node failure; the cycle is retried on the next trigger.
    #[error("ledger unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("malformed ledger response: {0}")]
    MalformedResponse(String),

    #[error("invalid ledger identity {0:?}")]
    InvalidIdentity(String),

    #[error("account {0} already exists")]
    AccountExists(String),

    #[error("unknown account {0}")]
    UnknownAccount(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    /// The ticket pool already holds the largest index.
    #[error("no index ticket left after {0}")]
    TicketsExhausted(u32),

    #[error("storage: {0}")]
    Storage(#[from] StoreError),

    /// The external mixing capability refused or failed.
    #[error("mixing engine: {0}")]
    Compute(String),

    #[error("stream stopped")]
    Stopped,
}
