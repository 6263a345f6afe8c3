//! mixer-store: durable local state for the mixer client
//!
//! One SQLite file (WAL journal) holds every table the client owns:
//! - `accounts`        : address, encoded identity, display name
//! - `index_tickets`   : the pool of allocatable deposit indices
//! - `transactions`    : append-only per-account history
//! - `stream_cursors`  : how much of each remote stream has been applied
//! - `config`          : small string key/value table (settings, cached gauges)
//!
//! Writes the synchronizer makes together with a cursor advance go through
//! the `apply_*` helpers, which commit both in one SQL transaction.

pub mod accounts;
pub mod apply;
pub mod cursors;
pub mod db;
pub mod error;
pub mod models;
pub mod settings;
pub mod tickets;
pub mod transactions;

pub use cursors::StreamKey;
pub use db::Store;
pub use error::StoreError;
pub use models::{canonical_address, Account, NewTransaction, Transaction};
