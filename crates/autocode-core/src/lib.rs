//! # autocode-core
//!
//! Core types for the autocode pipeline.
//!
//! A pipeline run turns one project idea into a chain of artifacts. Everything
//! the run learns along the way lives in a single [`Context`]:
//!
//! - the goal (set once)
//! - an ordered task list seeded by the plan
//! - an append-only history of what happened
//! - a variable map holding each stage's artifact

mod context;
mod error;

pub mod config;
pub mod fail_open;

pub use config::AutocodeConfig;
pub use context::{Context, ContextSnapshot, HistoryEntry};
pub use error::{AutocodeError, Result};
