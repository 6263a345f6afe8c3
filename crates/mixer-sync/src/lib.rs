//! mixer-sync: keeps the local store consistent with the pool program
//!
//! # Module layout
//! - `ledger`        : read/subscribe interface of the remote ledger, query and event types
//! - `engine`        : the external mixing capability (verification, deposits, withdrawals)
//! - `stream`        : per-stream FIFO worker, phases, activation and teardown
//! - `pool`          : withdrawal-pool cycle and its UI gauges
//! - `history`       : per-account history cycle
//! - `tickets`       : single-writer lock over the index-ticket pool
//! - `synchronizer`  : session-wide orchestration of the streams
//! - `accounts`      : account creation, import and export through the engine
//! - `session`       : passphrase check and pool-program selection

pub mod accounts;
pub mod engine;
pub mod error;
pub mod history;
pub mod ledger;
pub mod pool;
pub mod session;
pub mod stream;
pub mod synchronizer;
pub mod tickets;

pub use error::SyncError;
pub use ledger::{LedgerId, SyncConfig};
pub use synchronizer::Synchronizer;
