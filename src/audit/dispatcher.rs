//! Fire-and-forget delivery of activity entries.
//!
//! Delivery is at-most-once. `dispatch` never waits: when the queue is full
//! the entry is dropped, and when the log rejects a write the entry is lost.
//! Both cases are logged and counted in [`AuditCounters`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use warden_common::ActivityLogEntry;

use crate::store::ActivityLog;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

enum AuditCommand {
    Append(ActivityLogEntry),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct AuditStats {
    dispatched: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time view of the dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditCounters {
    pub dispatched: u64,
    pub written: u64,
    /// Rejected because the queue was full or the worker had stopped.
    pub dropped: u64,
    /// Accepted but the log write failed.
    pub failed: u64,
}

/// Handle to the background audit writer. Cheap to clone.
#[derive(Clone)]
pub struct AuditDispatcher {
    tx: mpsc::Sender<AuditCommand>,
    stats: Arc<AuditStats>,
}

impl AuditDispatcher {
    /// Start the writer task on the current tokio runtime.
    pub fn spawn(log: Arc<dyn ActivityLog>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(AuditStats::default());
        tokio::spawn(run_writer(log, rx, Arc::clone(&stats)));
        Self { tx, stats }
    }

    /// Queue an entry without waiting. Returns false if it was dropped.
    pub fn dispatch(&self, entry: ActivityLogEntry) -> bool {
        let activity = entry.activity_type;
        match self.tx.try_send(AuditCommand::Append(entry)) {
            Ok(()) => {
                self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(err) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                let cause = match err {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "writer stopped",
                };
                tracing::warn!(%activity, cause, dropped, "Dropped activity log entry");
                false
            }
        }
    }

    /// Wait until every entry queued before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(AuditCommand::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn counters(&self) -> AuditCounters {
        AuditCounters {
            dispatched: self.stats.dispatched.load(Ordering::Relaxed),
            written: self.stats.written.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

async fn run_writer(
    log: Arc<dyn ActivityLog>,
    mut rx: mpsc::Receiver<AuditCommand>,
    stats: Arc<AuditStats>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            AuditCommand::Append(entry) => {
                let activity = entry.activity_type;
                let entry_id = entry.id;
                match log.append(entry).await {
                    Ok(()) => {
                        stats.written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(%activity, %entry_id, error = %e, "Failed to write activity log entry");
                    }
                }
            }
            AuditCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Audit writer stopped");
}
