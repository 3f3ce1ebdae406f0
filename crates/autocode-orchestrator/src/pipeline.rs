//! Pipeline orchestrator
//!
//! Drives the stages through the state machine, records every outcome in the
//! run's context and always attempts to save the session at the end, whether
//! the run completed or aborted.

use crate::archive::JsonlArchive;
use crate::publish::DirectoryPublisher;
use crate::session::{export_snapshot, SessionStore};
use crate::stage::{
    FailurePolicy, Stage, StageArtifact, StageKind, StageOutcome, StageRecord, StageStatus,
};
use crate::stages::{
    ArchiveStage, CostStage, GenerativeStage, PlanningStage, PublishStage, FALLBACK_EVENT,
};
use crate::state_machine::{transition, Action, Event, State};
use autocode_agent::{CallOptions, Completion, RetryPolicy, UsageLedger, UsageSummary};
use autocode_core::fail_open::fail_open_with;
use autocode_core::{AutocodeConfig, AutocodeError, Context, ContextSnapshot, Result};
use autocode_planning::{fallback_plan, Plan};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// History event recorded when the session file could not be written
pub const SAVE_FAILED_EVENT: &str = "session save failed";
/// History event recorded when the timestamped snapshot could not be written
pub const EXPORT_FAILED_EVENT: &str = "snapshot export failed";

/// Final status of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunState {
    Completed,
    Aborted {
        stage: Option<StageKind>,
        reason: String,
    },
}

/// Everything a front end needs to render a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub session_id: String,
    pub state: RunState,
    pub stages: Vec<StageRecord>,
    pub usage: UsageSummary,
    /// Timestamped copy of the final context, when it could be written
    pub snapshot_path: Option<PathBuf>,
    /// Set when saving the session failed
    pub persist_error: Option<String>,
    pub context: ContextSnapshot,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Runs the stages in order over one context per run
pub struct Pipeline {
    stages: BTreeMap<StageKind, Arc<dyn Stage>>,
    store: SessionStore,
    ledger: Arc<UsageLedger>,
    snapshot_dir: Option<PathBuf>,
}

impl Pipeline {
    /// Create a pipeline. Exactly one stage must be given per [`StageKind`].
    pub fn new(
        stages: Vec<Arc<dyn Stage>>,
        store: SessionStore,
        ledger: Arc<UsageLedger>,
    ) -> Result<Self> {
        let mut by_kind = BTreeMap::new();
        for stage in stages {
            let kind = stage.kind();
            if by_kind.insert(kind, stage).is_some() {
                return Err(AutocodeError::Configuration(format!(
                    "Stage {} registered twice",
                    kind
                )));
            }
        }

        let missing: Vec<&str> = StageKind::ALL
            .iter()
            .filter(|k| !by_kind.contains_key(*k))
            .map(|k| k.name())
            .collect();
        if !missing.is_empty() {
            return Err(AutocodeError::Configuration(format!(
                "Missing stages: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            stages: by_kind,
            store,
            ledger,
            snapshot_dir: None,
        })
    }

    /// Build the standard pipeline from configuration
    pub fn standard(
        config: &AutocodeConfig,
        completion: Arc<dyn Completion>,
        ledger: Arc<UsageLedger>,
    ) -> Result<Self> {
        let retry = RetryPolicy::from_config(&config.retry)?;
        let options = CallOptions::from_config(&config.gateway);

        let mut stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(PlanningStage::new(
                Arc::clone(&completion),
                retry.clone(),
                options.clone(),
            )?),
            Arc::new(CostStage::new(config.estimator.clone())),
        ];
        for kind in GenerativeStage::KINDS {
            stages.push(Arc::new(GenerativeStage::new(
                kind,
                Arc::clone(&completion),
                retry.clone(),
                options.clone(),
            )));
        }
        stages.push(Arc::new(PublishStage::new(Arc::new(DirectoryPublisher::new(
            &config.outputs.dir,
        )))));
        stages.push(Arc::new(ArchiveStage::new(Arc::new(JsonlArchive::new(
            &config.outputs.archive_file,
        )))));

        Ok(Self::new(stages, SessionStore::new(&config.session.root), ledger)?
            .with_snapshot_dir(&config.outputs.dir))
    }

    /// Also export a timestamped snapshot into `dir` after each run
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run every stage for `goal` and save the result under `session_id`
    ///
    /// Returns an error only for unusable input. Stage failures end the run
    /// early and are reported in [`RunReport::state`].
    #[instrument(skip(self, goal), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, goal: &str, session_id: &str) -> Result<RunReport> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(AutocodeError::InvalidInput(
                "Project idea cannot be empty".to_string(),
            ));
        }
        self.store.path_for(session_id)?;

        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let mut ctx = Context::new();
        ctx.set_goal(goal)?;

        let mut records = Vec::new();
        let mut persist_error = None;

        let (mut state, initial) = transition(State::NotStarted, Event::Start);
        let mut pending: VecDeque<Action> = initial.into();

        while let Some(action) = pending.pop_front() {
            let event = match action {
                Action::LogActivity { message } => {
                    info!("{}", message);
                    continue;
                }
                Action::RunStage { stage } => {
                    let (event, record) = self.execute(stage, &mut ctx).await;
                    records.push(record);
                    event
                }
                Action::Persist => {
                    let saved = self.store.save(&ctx, session_id).await;
                    match saved {
                        Ok(_) => Event::Persisted,
                        Err(e) => {
                            error!("Failed to save session '{}': {}", session_id, e);
                            ctx.append_history(SAVE_FAILED_EVENT, e.to_string());
                            persist_error = Some(e.to_string());
                            Event::PersistFailed {
                                reason: e.to_string(),
                            }
                        }
                    }
                }
            };

            let (next, actions) = transition(state, event);
            state = next;
            pending.extend(actions);
        }

        let snapshot_path = match &self.snapshot_dir {
            Some(dir) => {
                let mut export_error = None;
                let path = fail_open_with(
                    "snapshot_export",
                    || export_snapshot(&ctx, dir),
                    |e| export_error = Some(e.to_string()),
                )
                .await;
                if let Some(reason) = export_error {
                    ctx.append_history(EXPORT_FAILED_EVENT, reason);
                }
                path
            }
            None => None,
        };

        let state = match state {
            State::Completed => RunState::Completed,
            State::Aborted { stage, reason } => RunState::Aborted { stage, reason },
            other => RunState::Aborted {
                stage: other.stage(),
                reason: format!("Pipeline stopped in unexpected state {:?}", other),
            },
        };

        Ok(RunReport {
            run_id,
            session_id: session_id.to_string(),
            state,
            stages: records,
            usage: self.ledger.summary(),
            snapshot_path,
            persist_error,
            context: ctx.snapshot(),
        })
    }

    /// Run one stage, absorb its outcome into `ctx`, and report the event
    async fn execute(&self, kind: StageKind, ctx: &mut Context) -> (Event, StageRecord) {
        let Some(stage) = self.stages.get(&kind) else {
            let reason = format!("no stage registered for {}", kind);
            ctx.append_history(format!("{} failed", kind), reason.clone());
            return (
                Event::StageFailed {
                    reason: reason.clone(),
                },
                StageRecord {
                    stage: kind,
                    status: StageStatus::Failed,
                    elapsed_ms: 0,
                    detail: Some(reason),
                },
            );
        };

        info!("Starting stage {}", kind);
        let started = Instant::now();
        let result = stage.run(ctx).await;
        let outcome = StageOutcome::from_result(kind, result, started.elapsed());

        self.absorb(outcome, ctx)
    }

    fn absorb(&self, outcome: StageOutcome, ctx: &mut Context) -> (Event, StageRecord) {
        let kind = outcome.kind();
        let elapsed_ms = outcome.elapsed().as_millis() as u64;
        let record = |status, detail: Option<String>| StageRecord {
            stage: kind,
            status,
            elapsed_ms,
            detail,
        };

        let (artifact, degraded) = match outcome {
            StageOutcome::Completed { artifact, .. } => (artifact, None),
            StageOutcome::Degraded {
                artifact, reason, ..
            } => (artifact, Some(reason)),
            StageOutcome::Failed { error, .. } => match kind.failure_policy() {
                FailurePolicy::Fallback => {
                    match fallback_artifact(ctx) {
                        Ok(artifact) => (artifact, Some(error.to_string())),
                        Err(e) => return abort(kind, e, elapsed_ms, ctx),
                    }
                }
                FailurePolicy::Ignore => {
                    warn!("Stage {} failed, continuing: {}", kind, error);
                    ctx.append_history(
                        format!("{} failed", kind),
                        format!("{} (ignored); elapsed_ms={}", error, elapsed_ms),
                    );
                    return (
                        Event::StageSucceeded,
                        record(StageStatus::Ignored, Some(error.to_string())),
                    );
                }
                FailurePolicy::Abort => return abort(kind, error, elapsed_ms, ctx),
            },
        };

        if let Err(e) = kind.validate(&artifact.value) {
            if kind.failure_policy() == FailurePolicy::Ignore {
                warn!("Stage {} returned an invalid artifact, continuing: {}", kind, e);
                ctx.append_history(
                    format!("{} failed", kind),
                    format!("{} (ignored); elapsed_ms={}", e, elapsed_ms),
                );
                return (
                    Event::StageSucceeded,
                    record(StageStatus::Ignored, Some(e.to_string())),
                );
            }
            return abort(kind, e, elapsed_ms, ctx);
        }

        ctx.set_variable(kind.variable_key(), artifact.value.clone());
        for (key, value) in artifact.auxiliary {
            ctx.set_variable(key, value);
        }

        if kind == StageKind::Plan {
            // Validation guarantees the shape
            if let Ok(plan) = serde_json::from_value::<Plan>(artifact.value) {
                for task in plan.tasks {
                    ctx.add_task(task);
                }
            }
        }

        match degraded {
            Some(reason) => {
                warn!("Stage {} degraded: {}", kind, reason);
                let detail = format!(
                    "Goal: {}; reason: {}; elapsed_ms={}",
                    ctx.goal().unwrap_or_default(),
                    reason,
                    elapsed_ms
                );
                ctx.append_history(FALLBACK_EVENT, detail);
                (
                    Event::StageSucceeded,
                    record(StageStatus::Degraded, Some(reason)),
                )
            }
            None => {
                debug!("Stage {} finished in {} ms", kind, elapsed_ms);
                ctx.append_history(
                    format!("{} completed", kind),
                    format!("elapsed_ms={}", elapsed_ms),
                );
                (Event::StageSucceeded, record(StageStatus::Completed, None))
            }
        }
    }
}

fn fallback_artifact(ctx: &Context) -> Result<StageArtifact> {
    let plan = fallback_plan(ctx.goal().unwrap_or_default());
    Ok(StageArtifact::new(serde_json::to_value(plan)?))
}

fn abort(
    kind: StageKind,
    error: AutocodeError,
    elapsed_ms: u64,
    ctx: &mut Context,
) -> (Event, StageRecord) {
    error!("Stage {} failed: {}", kind, error);
    let reason = error.to_string();
    ctx.append_history(
        format!("{} failed", kind),
        format!("{}; elapsed_ms={}", reason, elapsed_ms),
    );
    (
        Event::StageFailed {
            reason: reason.clone(),
        },
        StageRecord {
            stage: kind,
            status: StageStatus::Failed,
            elapsed_ms,
            detail: Some(reason),
        },
    )
}
