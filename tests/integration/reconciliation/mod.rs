//! Reconciliation suite: rebuild scenarios and sync dedupe

pub mod rebuild_scenarios;
pub mod sync_dedupe;
