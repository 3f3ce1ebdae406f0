//! Stage contract, stage kinds and per-stage outcomes

use async_trait::async_trait;
use autocode_core::{AutocodeError, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Plan,
    EstimateCost,
    WriteCode,
    Debug,
    UnitTest,
    IntegrationTest,
    SecurityScan,
    PerformanceTest,
    Document,
    Containerize,
    Publish,
    Archive,
}

/// What the orchestrator does when a stage returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Substitute a degraded artifact and continue
    Fallback,
    /// Record the failure in history and continue
    Ignore,
    /// Stop the run
    Abort,
}

impl StageKind {
    pub const ALL: [StageKind; 12] = [
        StageKind::Plan,
        StageKind::EstimateCost,
        StageKind::WriteCode,
        StageKind::Debug,
        StageKind::UnitTest,
        StageKind::IntegrationTest,
        StageKind::SecurityScan,
        StageKind::PerformanceTest,
        StageKind::Document,
        StageKind::Containerize,
        StageKind::Publish,
        StageKind::Archive,
    ];

    /// Stage that follows this one, if any
    pub fn next(self) -> Option<StageKind> {
        let idx = Self::ALL.iter().position(|k| *k == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn first() -> StageKind {
        StageKind::Plan
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Plan => "plan",
            StageKind::EstimateCost => "estimate_cost",
            StageKind::WriteCode => "write_code",
            StageKind::Debug => "debug",
            StageKind::UnitTest => "unit_test",
            StageKind::IntegrationTest => "integration_test",
            StageKind::SecurityScan => "security_scan",
            StageKind::PerformanceTest => "performance_test",
            StageKind::Document => "document",
            StageKind::Containerize => "containerize",
            StageKind::Publish => "publish",
            StageKind::Archive => "archive",
        }
    }

    /// Context variable the stage's artifact is stored under
    pub fn variable_key(self) -> &'static str {
        match self {
            StageKind::Plan => "structured_plan",
            StageKind::EstimateCost => "project_cost_estimate",
            StageKind::WriteCode => "generated_code",
            StageKind::Debug => "debugged_code",
            StageKind::UnitTest => "unit_test_report",
            StageKind::IntegrationTest => "integration_test_report",
            StageKind::SecurityScan => "security_report",
            StageKind::PerformanceTest => "performance_report",
            StageKind::Document => "documentation",
            StageKind::Containerize => "dockerfile",
            StageKind::Publish => "repo_url",
            StageKind::Archive => "archived_records",
        }
    }

    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            StageKind::Plan => FailurePolicy::Fallback,
            StageKind::Archive => FailurePolicy::Ignore,
            _ => FailurePolicy::Abort,
        }
    }

    /// Minimal shape check applied before the next stage runs
    pub fn validate(self, artifact: &Value) -> Result<()> {
        let reason = match self {
            StageKind::Plan => check_plan(artifact),
            StageKind::EstimateCost => check_estimate(artifact),
            StageKind::Archive => artifact
                .as_u64()
                .map(|_| ())
                .ok_or_else(|| "expected a record count".to_string()),
            _ => match artifact.as_str() {
                Some(text) if !text.trim().is_empty() => Ok(()),
                Some(_) => Err("text artifact is empty".to_string()),
                None => Err("expected a text artifact".to_string()),
            },
        };

        reason.map_err(|reason| AutocodeError::StageValidation {
            stage: self.name().to_string(),
            reason,
        })
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn check_plan(artifact: &Value) -> std::result::Result<(), String> {
    let plan = artifact
        .as_object()
        .ok_or_else(|| "plan is not a record".to_string())?;
    let tasks = plan
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or_else(|| "plan has no task list".to_string())?;
    if tasks.is_empty() {
        return Err("plan task list is empty".to_string());
    }
    if !tasks.iter().all(Value::is_string) {
        return Err("plan tasks must be strings".to_string());
    }
    Ok(())
}

fn check_estimate(artifact: &Value) -> std::result::Result<(), String> {
    for field in [
        "estimated_duration_weeks",
        "estimated_team_size",
        "estimated_total_cost_usd",
    ] {
        if artifact.get(field).and_then(Value::as_u64).is_none() {
            return Err(format!("missing integer field `{}`", field));
        }
    }
    Ok(())
}

/// Value produced by one stage invocation
#[derive(Debug, Clone, PartialEq)]
pub struct StageArtifact {
    pub value: Value,
    /// Set when the value is a fallback rather than real output
    pub degraded: Option<String>,
    /// Extra variables recorded alongside the main artifact
    pub auxiliary: BTreeMap<String, Value>,
}

impl StageArtifact {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            degraded: None,
            auxiliary: BTreeMap::new(),
        }
    }

    pub fn degraded(value: Value, reason: impl Into<String>) -> Self {
        Self {
            degraded: Some(reason.into()),
            ..Self::new(value)
        }
    }

    pub fn with_auxiliary(mut self, key: impl Into<String>, value: Value) -> Self {
        self.auxiliary.insert(key.into(), value);
        self
    }
}

/// One pipeline step
///
/// Stages read earlier artifacts from the context but never write to it. The
/// orchestrator records what they return.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn run(&self, ctx: &Context) -> Result<StageArtifact>;
}

/// Result of one stage invocation, tagged with stage and timing
#[derive(Debug)]
pub enum StageOutcome {
    Completed {
        kind: StageKind,
        artifact: StageArtifact,
        elapsed: Duration,
    },
    Degraded {
        kind: StageKind,
        artifact: StageArtifact,
        reason: String,
        elapsed: Duration,
    },
    Failed {
        kind: StageKind,
        error: AutocodeError,
        elapsed: Duration,
    },
}

impl StageOutcome {
    /// Classify a stage's return value
    pub fn from_result(kind: StageKind, result: Result<StageArtifact>, elapsed: Duration) -> Self {
        match result {
            Ok(artifact) => match artifact.degraded.clone() {
                Some(reason) => StageOutcome::Degraded {
                    kind,
                    artifact,
                    reason,
                    elapsed,
                },
                None => StageOutcome::Completed {
                    kind,
                    artifact,
                    elapsed,
                },
            },
            Err(error) => StageOutcome::Failed {
                kind,
                error,
                elapsed,
            },
        }
    }

    pub fn kind(&self) -> StageKind {
        match self {
            StageOutcome::Completed { kind, .. }
            | StageOutcome::Degraded { kind, .. }
            | StageOutcome::Failed { kind, .. } => *kind,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            StageOutcome::Completed { elapsed, .. }
            | StageOutcome::Degraded { elapsed, .. }
            | StageOutcome::Failed { elapsed, .. } => *elapsed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }
}

/// Status of a stage in the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Degraded,
    Failed,
    /// Failed, but the stage's policy lets the run continue
    Ignored,
}

/// Serializable summary of one stage, for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub status: StageStatus,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
