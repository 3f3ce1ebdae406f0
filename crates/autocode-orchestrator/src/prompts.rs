//! Prompt templates for the generative stages
//!
//! Each builder reads the artifacts its stage depends on from the context and
//! fails with a stage error when one is missing.

use crate::stage::StageKind;
use autocode_core::{AutocodeError, Context, Result};
use autocode_planning::Plan;

/// Prompt asking the service to break a goal into an enumerated task list
pub fn planning(goal: &str) -> String {
    format!(
        "You are a professional software architect.\n\n\
         Break the following project idea into an ordered list of concrete \
         implementation tasks. Reply with one task per line, each starting \
         with a number followed by a period.\n\n\
         Project idea:\n{}\n",
        goal
    )
}

/// Build the prompt for a generative stage from its inputs in `ctx`
pub fn render(kind: StageKind, ctx: &Context) -> Result<String> {
    let prompt = match kind {
        StageKind::WriteCode => write_code(ctx)?,
        StageKind::Debug => with_code(
            "You are a senior software engineer and code reviewer. Find the bugs in \
             the code below, fix them, and return the corrected program in full.",
            require_text(ctx, kind, StageKind::WriteCode.variable_key())?,
        ),
        StageKind::UnitTest => with_code(
            "You are a senior software testing engineer. Write unit tests for the \
             code below. Return only code.",
            debugged(ctx, kind)?,
        ),
        StageKind::IntegrationTest => with_code(
            "You are a QA engineer. Write integration tests exercising the components \
             of the code below together. Return only code.",
            debugged(ctx, kind)?,
        ),
        StageKind::SecurityScan => with_code(
            "You are a senior security analyst. Review the code below for unsafe input \
             handling, insecure libraries and hardcoded secrets. List each issue with \
             a suggested fix.",
            debugged(ctx, kind)?,
        ),
        StageKind::PerformanceTest => with_code(
            "You are a performance engineering expert. Identify bottlenecks and memory \
             or CPU inefficiencies in the code below and suggest optimizations.",
            debugged(ctx, kind)?,
        ),
        StageKind::Document => with_code(
            "You are a technical writer. Write a README for the code below: what it \
             does, how to install it, and how to use it.",
            debugged(ctx, kind)?,
        ),
        StageKind::Containerize => with_code(
            "Write a production-grade Dockerfile for the project below. Use a slim \
             base image and install only what is needed. Return only the Dockerfile.",
            debugged(ctx, kind)?,
        ),
        other => {
            return Err(AutocodeError::Stage {
                stage: other.name().to_string(),
                message: "stage has no prompt template".to_string(),
            })
        }
    };
    Ok(prompt)
}

fn write_code(ctx: &Context) -> Result<String> {
    let kind = StageKind::WriteCode;
    let plan: Plan = ctx
        .get_variable_as(StageKind::Plan.variable_key())?
        .ok_or_else(|| missing_input(kind, StageKind::Plan.variable_key()))?;

    let mut prompt = String::from(
        "You are a professional Python developer. Write clean, correct and \
         well-commented code that fulfils the project below. Split the code into functions and \
         handle edge cases.\n\n",
    );
    prompt.push_str(&format!("## Project\n\n{}\n\n## Tasks\n\n", plan.goal));
    for (idx, task) in plan.tasks.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", idx + 1, task));
    }
    Ok(prompt)
}

fn with_code(instructions: &str, code: &str) -> String {
    format!("{}\n\n```\n{}\n```\n", instructions, code)
}

fn debugged(ctx: &Context, kind: StageKind) -> Result<&str> {
    require_text(ctx, kind, StageKind::Debug.variable_key())
}

fn require_text<'a>(ctx: &'a Context, kind: StageKind, key: &str) -> Result<&'a str> {
    ctx.get_text(key).ok_or_else(|| missing_input(kind, key))
}

fn missing_input(kind: StageKind, key: &str) -> AutocodeError {
    AutocodeError::Stage {
        stage: kind.name().to_string(),
        message: format!("missing input `{}`", key),
    }
}
