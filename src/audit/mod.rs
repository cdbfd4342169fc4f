//! Audit trail plumbing.
//!
//! Every reviewer transition produces one [`ActivityLogEntry`]. The session
//! controller hands entries to an [`AuditDispatcher`], which queues them for a
//! background task so a slow or failing log never delays or fails a decision.
//! [`JsonlActivityLog`] is the durable file-backed log used by the CLI.
//!
//! [`ActivityLogEntry`]: warden_common::ActivityLogEntry

pub mod dispatcher;
pub mod logger;

pub use dispatcher::{AuditCounters, AuditDispatcher, DEFAULT_QUEUE_CAPACITY};
pub use logger::JsonlActivityLog;
