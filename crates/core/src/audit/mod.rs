//! Audit queue: ports and the service driving the ledger state machine

pub mod ports;
pub mod service;

pub use service::{AuditQueueService, Claim};
