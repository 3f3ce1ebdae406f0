//! Built-in pipeline stages

use crate::archive::ContextSink;
use crate::prompts;
use crate::publish::{project_slug, PublishBundle, Publisher};
use crate::stage::{Stage, StageArtifact, StageKind};
use async_trait::async_trait;
use autocode_agent::{CallOptions, Completion, RetryPolicy};
use autocode_core::config::EstimatorConfig;
use autocode_core::{AutocodeError, Context, Result};
use autocode_planning::{estimate_cost, fallback_plan, Plan, TaskListParser};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// History event recorded when the planning stage degrades
pub const FALLBACK_EVENT: &str = "Fallback plan used";

fn require_goal(ctx: &Context, kind: StageKind) -> Result<&str> {
    ctx.goal().ok_or_else(|| AutocodeError::Stage {
        stage: kind.name().to_string(),
        message: "no goal set".to_string(),
    })
}

fn require_text<'a>(ctx: &'a Context, kind: StageKind, input: StageKind) -> Result<&'a str> {
    let key = input.variable_key();
    ctx.get_text(key).ok_or_else(|| AutocodeError::Stage {
        stage: kind.name().to_string(),
        message: format!("missing input `{}`", key),
    })
}

/// Breaks the goal into tasks, degrading to the fallback plan on any failure
pub struct PlanningStage {
    completion: Arc<dyn Completion>,
    retry: RetryPolicy,
    options: CallOptions,
    parser: TaskListParser,
}

impl PlanningStage {
    pub fn new(
        completion: Arc<dyn Completion>,
        retry: RetryPolicy,
        options: CallOptions,
    ) -> Result<Self> {
        Ok(Self {
            completion,
            retry,
            options,
            parser: TaskListParser::new()?,
        })
    }

    fn degraded(goal: &str, reason: impl Into<String>) -> Result<StageArtifact> {
        let reason = reason.into();
        warn!("Planning degraded, using fallback plan: {}", reason);
        let plan = serde_json::to_value(fallback_plan(goal))?;
        Ok(StageArtifact::degraded(plan, reason))
    }
}

#[async_trait]
impl Stage for PlanningStage {
    fn kind(&self) -> StageKind {
        StageKind::Plan
    }

    #[instrument(skip_all, fields(stage = "plan"))]
    async fn run(&self, ctx: &Context) -> Result<StageArtifact> {
        let goal = require_goal(ctx, StageKind::Plan)?;
        let prompt = prompts::planning(goal);

        let raw = match self
            .retry
            .retry("plan", || self.completion.complete(&prompt, &self.options))
            .await
        {
            Ok(raw) => raw,
            Err(e) => return Self::degraded(goal, e.to_string()),
        };

        let plan: Plan = self.parser.plan(goal, &raw);
        if plan.tasks.is_empty() {
            return Self::degraded(goal, "planning output contained no tasks");
        }

        debug!("Parsed {} tasks from planning output", plan.task_count());
        Ok(StageArtifact::new(serde_json::to_value(&plan)?)
            .with_auxiliary("raw_llm_output", Value::String(raw))
            .with_auxiliary("used_model", Value::String(self.options.model.clone())))
    }
}

/// Derives the cost estimate from the recorded plan
pub struct CostStage {
    tables: EstimatorConfig,
}

impl CostStage {
    pub fn new(tables: EstimatorConfig) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl Stage for CostStage {
    fn kind(&self) -> StageKind {
        StageKind::EstimateCost
    }

    async fn run(&self, ctx: &Context) -> Result<StageArtifact> {
        let plan: Plan = ctx
            .get_variable_as(StageKind::Plan.variable_key())?
            .ok_or_else(|| AutocodeError::Stage {
                stage: self.kind().name().to_string(),
                message: "no plan recorded".to_string(),
            })?;

        let estimate = estimate_cost(&plan, &self.tables);
        info!(
            "Estimated cost: ${} | team size: {} | duration: {} weeks",
            estimate.estimated_total_cost_usd,
            estimate.estimated_team_size,
            estimate.estimated_duration_weeks
        );
        Ok(StageArtifact::new(serde_json::to_value(estimate)?))
    }
}

/// A stage that sends one prompt to the service and keeps the reply
pub struct GenerativeStage {
    kind: StageKind,
    completion: Arc<dyn Completion>,
    retry: RetryPolicy,
    options: CallOptions,
}

impl GenerativeStage {
    pub fn new(
        kind: StageKind,
        completion: Arc<dyn Completion>,
        retry: RetryPolicy,
        options: CallOptions,
    ) -> Self {
        Self {
            kind,
            completion,
            retry,
            options,
        }
    }

    /// Stages backed by a prompt template, in pipeline order
    pub const KINDS: [StageKind; 8] = [
        StageKind::WriteCode,
        StageKind::Debug,
        StageKind::UnitTest,
        StageKind::IntegrationTest,
        StageKind::SecurityScan,
        StageKind::PerformanceTest,
        StageKind::Document,
        StageKind::Containerize,
    ];
}

#[async_trait]
impl Stage for GenerativeStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    #[instrument(skip_all, fields(stage = %self.kind))]
    async fn run(&self, ctx: &Context) -> Result<StageArtifact> {
        let prompt = prompts::render(self.kind, ctx)?;
        let text = self
            .retry
            .retry(self.kind.name(), || {
                self.completion.complete(&prompt, &self.options)
            })
            .await?;

        debug!("{} produced {} chars", self.kind, text.len());
        Ok(StageArtifact::new(Value::String(text)))
    }
}

/// Hands the generated project to a [`Publisher`]
pub struct PublishStage {
    publisher: Arc<dyn Publisher>,
}

impl PublishStage {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn kind(&self) -> StageKind {
        StageKind::Publish
    }

    async fn run(&self, ctx: &Context) -> Result<StageArtifact> {
        let kind = self.kind();
        let bundle = PublishBundle {
            name: project_slug(require_goal(ctx, kind)?),
            files: vec![
                (
                    "main.py".to_string(),
                    require_text(ctx, kind, StageKind::Debug)?.to_string(),
                ),
                (
                    "README.md".to_string(),
                    require_text(ctx, kind, StageKind::Document)?.to_string(),
                ),
                (
                    "Dockerfile".to_string(),
                    require_text(ctx, kind, StageKind::Containerize)?.to_string(),
                ),
            ],
        };

        let location = self.publisher.publish(&bundle).await?;
        Ok(StageArtifact::new(json!(location)))
    }
}

/// Sends the current snapshot to the long-term archive
pub struct ArchiveStage {
    sink: Arc<dyn ContextSink>,
}

impl ArchiveStage {
    pub fn new(sink: Arc<dyn ContextSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Stage for ArchiveStage {
    fn kind(&self) -> StageKind {
        StageKind::Archive
    }

    async fn run(&self, ctx: &Context) -> Result<StageArtifact> {
        let written = self.sink.store(&ctx.snapshot()).await?;
        Ok(StageArtifact::new(json!(written)))
    }
}
