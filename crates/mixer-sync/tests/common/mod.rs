#![allow(dead_code)]

use async_trait::async_trait;
use mixer_store::{Account, Store};
use mixer_sync::engine::{IssuedAccount, MixingEngine, PoolVerdict};
use mixer_sync::ledger::{
    EventHandler, EventKind, HistoryEntry, LedgerEvent, LedgerId, LedgerReader,
    NotificationSource, StateQuery, Subscription, ID_LEN,
};
use mixer_sync::stream::StreamStatus;
use mixer_sync::{SyncConfig, SyncError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::sync::{watch, Semaphore};

pub fn id(byte: u8) -> LedgerId {
    LedgerId::from_bytes([byte; ID_LEN])
}

pub fn program() -> LedgerId {
    id(0xbf)
}

pub fn config() -> SyncConfig {
    SyncConfig {
        pool_program: program(),
    }
}

pub fn output(n: u8) -> [u8; ID_LEN] {
    [n; ID_LEN]
}

pub async fn open_store() -> (Store, TempDir) {
    let dir = tempdir().unwrap();
    let store = Store::open(&dir.path().join("mixer.db")).await.expect("open store");
    (store, dir)
}

pub async fn wait_until(rx: &mut watch::Receiver<StreamStatus>, pred: impl Fn(&StreamStatus) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&rx.borrow()) {
                return;
            }
            rx.changed().await.expect("stream status dropped");
        }
    })
    .await
    .expect("timed out waiting for stream status");
}

pub async fn wait_for(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

/// Ledger double serving the pool program's output log, one history per
/// account and the leaves count.
#[derive(Default)]
pub struct MockLedger {
    pub withdrawn: Mutex<Vec<[u8; ID_LEN]>>,
    pub histories: Mutex<HashMap<LedgerId, Vec<HistoryEntry>>>,
    pub leaves: AtomicU64,
    pub queries: Mutex<Vec<StateQuery>>,
    pub fail_next: AtomicUsize,
    pub malformed: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every read wait for a permit from the returned semaphore.
    pub fn gate(&self) -> Arc<Semaphore> {
        let sem = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(sem.clone());
        sem
    }

    pub fn push_history(&self, user: LedgerId, entries: &[(i64, u64)]) {
        let mut histories = self.histories.lock();
        let list = histories.entry(user).or_default();
        list.extend(entries.iter().map(|(amount, time)| HistoryEntry {
            amount: *amount,
            time: *time,
        }));
    }

    pub fn push_withdrawn(&self, outputs: &[[u8; ID_LEN]]) {
        self.withdrawn.lock().extend_from_slice(outputs);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn history_reads(&self) -> Vec<u64> {
        self.queries
            .lock()
            .iter()
            .filter_map(|q| match q {
                StateQuery::HistoryOneFrom { from, .. } => Some(*from),
                _ => None,
            })
            .collect()
    }

    pub fn withdrawn_reads(&self) -> Vec<u64> {
        self.queries
            .lock()
            .iter()
            .filter_map(|q| match q {
                StateQuery::Withdrawn { from } => Some(*from),
                _ => None,
            })
            .collect()
    }

    fn answer(&self, query: &StateQuery) -> Value {
        match query {
            StateQuery::LeavesLen {} => json!({ "res": self.leaves.load(Ordering::SeqCst) }),
            StateQuery::Withdrawn { from } => {
                let all = self.withdrawn.lock();
                let res: Vec<String> = all
                    .iter()
                    .skip(*from as usize)
                    .map(|o| format!("0x{}", hex::encode(o)))
                    .collect();
                json!({ "res": res })
            }
            StateQuery::HistoryOneFrom { user, from } => {
                let histories = self.histories.lock();
                let res: Vec<HistoryEntry> = histories
                    .get(user)
                    .map(|list| list.iter().skip(*from as usize).cloned().collect())
                    .unwrap_or_default();
                json!({ "res": res })
            }
        }
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn read(&self, target: &LedgerId, query: &StateQuery) -> Result<Value, SyncError> {
        assert_eq!(*target, program(), "read against the wrong program");
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(sem) = gate {
            sem.acquire().await.expect("gate closed").forget();
        }

        self.queries.lock().push(query.clone());
        let result = if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            Err(SyncError::RemoteUnavailable("node offline".into()))
        } else if self.malformed.load(Ordering::SeqCst) {
            Ok(json!({ "unexpected": true }))
        } else {
            Ok(self.answer(query))
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

type HandlerTable = Mutex<Vec<(u64, EventKind, EventHandler)>>;

#[derive(Default)]
pub struct MockNotifications {
    handlers: Arc<HandlerTable>,
    next_id: AtomicU64,
}

impl MockNotifications {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn active(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Delivers `event` to every live handler of its kind.
    pub fn emit(&self, event: LedgerEvent) {
        let handlers: Vec<EventHandler> = self
            .handlers
            .lock()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    pub fn pool_changed(&self) {
        self.emit(LedgerEvent::StateChanged {
            changed: vec![program().to_hex()],
        });
    }

    pub fn delivered(&self, source: LedgerId, destination: LedgerId) {
        self.emit(LedgerEvent::MessageDelivered {
            source: source.to_hex(),
            destination: destination.to_hex(),
        });
    }
}

struct MockSubscription {
    id: u64,
    handlers: Arc<HandlerTable>,
}

impl Subscription for MockSubscription {
    fn cancel(&self) {
        self.handlers.lock().retain(|(id, _, _)| *id != self.id);
    }
}

#[async_trait]
impl NotificationSource for MockNotifications {
    async fn subscribe(
        &self,
        kind: EventKind,
        handler: EventHandler,
    ) -> Result<Box<dyn Subscription>, SyncError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().push((id, kind, handler));
        Ok(Box::new(MockSubscription {
            id,
            handlers: self.handlers.clone(),
        }))
    }
}

/// What the engine was handed at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub addresses: Vec<String>,
    pub password: String,
    pub tickets: BTreeSet<u32>,
    pub program: LedgerId,
}

/// Mixing engine double: outputs map to local tickets through a fixed table.
#[derive(Default)]
pub struct MockEngine {
    pub activations: Mutex<Vec<Activation>>,
    pub refuse_activation: AtomicBool,
    /// Byte the next created account's identity is filled with.
    pub next_account: AtomicU8,
    pub consumes: Mutex<HashMap<[u8; ID_LEN], u32>>,
    pub amount: AtomicU64,
    pub deposits: Mutex<Vec<(String, u32, u32)>>,
    pub withdrawals: Mutex<Vec<(String, u32)>>,
    pub verify_calls: AtomicUsize,
    pub notes_per_deposit: AtomicUsize,
    verify_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        let engine = Self::default();
        engine.notes_per_deposit.store(1, Ordering::SeqCst);
        engine.next_account.store(0xc0, Ordering::SeqCst);
        Arc::new(engine)
    }

    pub fn maps(&self, output: [u8; ID_LEN], ticket: u32) {
        self.consumes.lock().insert(output, ticket);
    }

    pub fn gate_verify(&self) -> Arc<Semaphore> {
        let sem = Arc::new(Semaphore::new(0));
        *self.verify_gate.lock() = Some(sem.clone());
        sem
    }
}

#[async_trait]
impl MixingEngine for MockEngine {
    async fn activate_accounts(
        &self,
        addresses: &[String],
        password: &str,
        tickets: &BTreeSet<u32>,
        program: &LedgerId,
    ) -> Result<(), SyncError> {
        if self.refuse_activation.load(Ordering::SeqCst) {
            return Err(SyncError::Compute("engine refused activation".into()));
        }
        self.activations.lock().push(Activation {
            addresses: addresses.to_vec(),
            password: password.to_string(),
            tickets: tickets.clone(),
            program: *program,
        });
        Ok(())
    }

    async fn create_account(&self) -> Result<IssuedAccount, SyncError> {
        let byte = self.next_account.fetch_add(1, Ordering::SeqCst);
        // engines may hand back upper-case hex
        Ok(IssuedAccount {
            address: format!("0x{}", hex::encode_upper([byte; ID_LEN])),
            identity: format!("ss58-{byte}"),
        })
    }

    /// Accepts `address|identity|name` under the password `account-pw`.
    async fn import_account(&self, encoded: &str, password: &str) -> Result<Account, SyncError> {
        let parts: Vec<&str> = encoded.split('|').collect();
        match (password, parts.as_slice()) {
            ("account-pw", [address, identity, name]) => Ok(Account {
                address: address.to_string(),
                identity: identity.to_string(),
                name: name.to_string(),
            }),
            _ => Err(SyncError::Compute("cannot open account export".into())),
        }
    }

    async fn export_account(&self, address: &str, name: &str) -> Result<String, SyncError> {
        Ok(format!("{address}|exported|{name}"))
    }

    async fn verify_and_consume(&self, outputs: &[[u8; ID_LEN]]) -> Result<PoolVerdict, SyncError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.verify_gate.lock().clone();
        if let Some(sem) = gate {
            sem.acquire().await.expect("gate closed").forget();
        }
        let table = self.consumes.lock();
        let consumed: BTreeSet<u32> = outputs.iter().filter_map(|o| table.get(o).copied()).collect();
        Ok(PoolVerdict {
            amount: self.amount.load(Ordering::SeqCst),
            consumed,
        })
    }

    async fn issue_deposit(&self, address: &str, amount: u32, shift: u32) -> Result<Vec<u32>, SyncError> {
        if amount == 0 {
            return Err(SyncError::Compute("zero deposit".into()));
        }
        self.deposits.lock().push((address.to_string(), amount, shift));
        let notes = self.notes_per_deposit.load(Ordering::SeqCst) as u32;
        Ok((shift..shift + notes).collect())
    }

    async fn issue_withdraw(&self, address: &str, amount: u32) -> Result<(), SyncError> {
        self.withdrawals.lock().push((address.to_string(), amount));
        Ok(())
    }

    async fn import_pool(
        &self,
        encrypted: &str,
        password: &str,
        shift: u32,
    ) -> Result<(u64, Vec<u32>), SyncError> {
        if password != "bundle-pw" || !encrypted.starts_with("bundle:") {
            return Err(SyncError::Compute("cannot open bundle".into()));
        }
        let notes = 2_u32;
        let amount = self.amount.fetch_add(u64::from(notes), Ordering::SeqCst) + u64::from(notes);
        Ok((amount, (shift..shift + notes).collect()))
    }

    async fn export_pool(&self, amount: u32) -> Result<String, SyncError> {
        Ok(format!("bundle:{amount}"))
    }
}
