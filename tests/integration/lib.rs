//! Integration tests for perp-exec
//!
//! Venue drivers run against mockito stand-ins for their REST surfaces;
//! the reconciliation, execution, and lifecycle suites run against the
//! in-memory store and a scriptable driver.

pub mod execution;
pub mod reconciliation;
pub mod support;
pub mod trader_lifecycle;
pub mod venues;

pub use perp_exec::prelude::*;
