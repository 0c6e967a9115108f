//! Link rebuilds.
//!
//! - `provider`: per-type link sources
//! - `planner`: which types a batch re-enumerates
//! - `batch`: the resumable step function
//! - `runner`: job persistence, leases and cancellation

pub mod batch;
pub mod planner;
pub mod provider;
mod runner;

pub use batch::{BatchContext, BatchJob};
pub use planner::{BatchPlan, RebuildAdvice, advise, full_plan, operator_selection, plan_rebuild};
pub use provider::ProviderRegistry;
pub use runner::{BatchRunner, CancelOutcome, RunOutcome, StartOutcome};
