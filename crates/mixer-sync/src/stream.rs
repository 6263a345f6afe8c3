//! Per-stream serialized execution.
//!
//! Every stream instance owns one FIFO job queue drained by one worker task,
//! so cycles of the same stream never overlap and run in trigger order.
//! Triggers are never coalesced: each bootstrap, notification or manual
//! refresh becomes exactly one cycle. The cursor lives in the worker and is
//! only read and advanced there.
//!
//! Teardown cancels the subscription and appends a stop marker; cycles
//! queued before the marker still run and apply.

use async_trait::async_trait;
use mixer_store::{Store, StreamKey};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::SyncError;
use crate::ledger::{EventHandler, EventKind, LedgerEvent, NotificationSource, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Uninitialized,
    Bootstrapping,
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatus {
    pub phase: StreamPhase,
    pub cursor: u64,
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    pub last_error: Option<String>,
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self {
            phase: StreamPhase::Uninitialized,
            cursor: 0,
            cycles_ok: 0,
            cycles_failed: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Bootstrap,
    Notification,
    Manual,
}

#[derive(Debug)]
enum Job {
    Cycle(Trigger),
    Stop,
}

/// The stream-specific half of a synchronizer: what to watch and how to
/// fetch and apply one range.
#[async_trait]
pub trait StreamCycle: Send + Sync + 'static {
    fn key(&self) -> &StreamKey;

    fn event_kind(&self) -> EventKind;

    /// Whether `event` names this stream's watched resource.
    fn watches(&self, event: &LedgerEvent) -> bool;

    /// Loads cached values before the first cycle.
    async fn activate(&self) -> Result<(), SyncError> {
        Ok(())
    }

    /// Fetches `[cursor, ..)`, applies it and returns the stored cursor.
    /// On error nothing has been applied.
    async fn run(&self, cursor: u64) -> Result<u64, SyncError>;
}

pub struct StreamHandle {
    key: StreamKey,
    jobs: mpsc::UnboundedSender<Job>,
    status: watch::Receiver<StreamStatus>,
    subscription: Box<dyn Subscription>,
    worker: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Loads the persisted cursor, queues the bootstrap cycle and subscribes
    /// to the stream's notifications.
    pub async fn activate<C: StreamCycle>(
        cycle: Arc<C>,
        store: &Store,
        notifications: &dyn NotificationSource,
    ) -> Result<Self, SyncError> {
        let key = cycle.key().clone();
        let (status_tx, status_rx) = watch::channel(StreamStatus::default());

        status_tx.send_modify(|s| s.phase = StreamPhase::Bootstrapping);
        let cursor = store.cursor(&key).await?;
        cycle.activate().await?;
        status_tx.send_modify(|s| {
            s.cursor = cursor;
            s.phase = StreamPhase::Idle;
        });

        let (jobs, queue) = mpsc::unbounded_channel();
        jobs.send(Job::Cycle(Trigger::Bootstrap))
            .map_err(|_| SyncError::Stopped)?;

        let handler: EventHandler = {
            let jobs = jobs.clone();
            let cycle = cycle.clone();
            Arc::new(move |event: LedgerEvent| {
                if !cycle.watches(&event) {
                    trace!(stream = %cycle.key(), ?event, "event ignored");
                    return;
                }
                if jobs.send(Job::Cycle(Trigger::Notification)).is_err() {
                    debug!(stream = %cycle.key(), "trigger after teardown dropped");
                }
            })
        };
        let subscription = notifications.subscribe(cycle.event_kind(), handler).await?;

        let worker = tokio::spawn(run_worker(cycle, queue, cursor, status_tx));
        info!(stream = %key, cursor, "stream activated");

        Ok(Self {
            key,
            jobs,
            status: status_rx,
            subscription,
            worker: Some(worker),
        })
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn status(&self) -> StreamStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<StreamStatus> {
        self.status.clone()
    }

    /// Queues one more cycle, e.g. a user-requested refresh.
    pub fn trigger(&self) -> Result<(), SyncError> {
        self.jobs
            .send(Job::Cycle(Trigger::Manual))
            .map_err(|_| SyncError::Stopped)
    }

    /// Stops future triggers and waits for already queued cycles to finish.
    pub async fn deactivate(mut self) -> StreamStatus {
        self.subscription.cancel();
        let _ = self.jobs.send(Job::Stop);
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                error!(stream = %self.key, error = %err, "stream worker panicked");
            }
        }
        self.status()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.subscription.cancel();
        let _ = self.jobs.send(Job::Stop);
    }
}

async fn run_worker<C: StreamCycle>(
    cycle: Arc<C>,
    mut queue: mpsc::UnboundedReceiver<Job>,
    mut cursor: u64,
    status: watch::Sender<StreamStatus>,
) {
    let key = cycle.key().clone();
    while let Some(job) = queue.recv().await {
        let trigger = match job {
            Job::Cycle(trigger) => trigger,
            Job::Stop => break,
        };
        status.send_modify(|s| s.phase = StreamPhase::Running);
        debug!(stream = %key, ?trigger, cursor, "cycle started");

        match cycle.run(cursor).await {
            Ok(next) => {
                if next < cursor {
                    warn!(stream = %key, cursor, next, "cycle reported a cursor behind the current one");
                }
                cursor = cursor.max(next);
                status.send_modify(|s| {
                    s.cursor = cursor;
                    s.cycles_ok += 1;
                    s.last_error = None;
                    s.phase = StreamPhase::Idle;
                });
            }
            Err(err) => {
                warn!(stream = %key, error = %err, cursor, "cycle failed; cursor unchanged");
                status.send_modify(|s| {
                    s.cycles_failed += 1;
                    s.last_error = Some(err.to_string());
                    s.phase = StreamPhase::Idle;
                });
            }
        }
    }
    status.send_modify(|s| s.phase = StreamPhase::Stopped);
    info!(stream = %key, cursor, "stream stopped");
}
