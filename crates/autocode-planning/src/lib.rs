//! Planning for autocode
//!
//! This crate turns free-text planning output into a [`Plan`], supplies the
//! fallback plan used when the service cannot be reached, and derives a
//! [`CostEstimate`] from the estimator tables.

mod cost;
mod plan;

pub use cost::{estimate_cost, CostEstimate};
pub use plan::{fallback_plan, Plan, TaskListParser, FALLBACK_TASKS};
