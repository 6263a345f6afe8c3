//! Single-writer lock over the index-ticket pool.
//!
//! Deposit allocation reads `last_index()` and assumes the next slot is
//! free; the pool stream removes consumed tickets. Both hold this lock for
//! the whole read-compute-write sequence.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Clone, Default, Debug)]
pub struct TicketLock {
    inner: Arc<Mutex<()>>,
}

pub struct TicketGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl TicketLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> TicketGuard<'_> {
        TicketGuard {
            _guard: self.inner.lock().await,
        }
    }

    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
