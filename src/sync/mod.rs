//! Order–fill–position reconciliation
//!
//! The normalizer turns venue fills into canonical records; the worker
//! pulls them on a cadence and converges the store.

/// Venue fill normalization rules
pub mod normalizer;
/// Background sync worker
pub mod worker;

pub use worker::{SyncWorker, sync_once};
