//! # autocode-orchestrator
//!
//! Staged pipeline engine for autocode.
//!
//! This crate provides:
//! - The [`Stage`] contract and the built-in stages
//! - A pure state machine deciding which stage runs next
//! - The [`Pipeline`] that times stages, records outcomes and saves sessions
//! - Session persistence and the long-term archive sink

mod archive;
mod pipeline;
mod prompts;
mod publish;
mod session;
mod stage;
mod stages;
mod state_machine;

pub use archive::{flatten, ArchiveRecord, ContextSink, JsonlArchive};
pub use pipeline::{Pipeline, RunReport, RunState, EXPORT_FAILED_EVENT, SAVE_FAILED_EVENT};
pub use publish::{project_slug, DirectoryPublisher, PublishBundle, Publisher};
pub use session::{export_snapshot, SessionStore};
pub use stage::{
    FailurePolicy, Stage, StageArtifact, StageKind, StageOutcome, StageRecord, StageStatus,
};
pub use stages::{
    ArchiveStage, CostStage, GenerativeStage, PlanningStage, PublishStage, FALLBACK_EVENT,
};
pub use state_machine::{transition, Action, Event, State};
