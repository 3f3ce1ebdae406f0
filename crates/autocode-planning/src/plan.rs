//! Plan type and planning-output parsing

use autocode_core::{AutocodeError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Generic task sequence used when planning output is unavailable
pub const FALLBACK_TASKS: [&str; 5] = [
    "Define requirements",
    "Design architecture",
    "Implement modules",
    "Test and debug",
    "Deploy and monitor",
];

/// Leading enumerator: `1.`, `-` or `*` followed by whitespace
const ENUMERATED_LINE: &str = r"^\s*(?:\d+\.|-|\*)\s+(.*)";

/// Ordered project plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub tasks: Vec<String>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, tasks: Vec<String>) -> Self {
        Self {
            goal: goal.into(),
            tasks,
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// The degraded plan substituted when planning fails
pub fn fallback_plan(goal: impl Into<String>) -> Plan {
    Plan::new(
        goal,
        FALLBACK_TASKS.iter().map(|t| t.to_string()).collect(),
    )
}

/// Extracts a task list from free-text planning output
#[derive(Debug, Clone)]
pub struct TaskListParser {
    enumerated: Regex,
}

impl TaskListParser {
    pub fn new() -> Result<Self> {
        let enumerated = Regex::new(ENUMERATED_LINE)
            .map_err(|e| AutocodeError::Other(format!("Invalid task pattern: {}", e)))?;
        Ok(Self { enumerated })
    }

    /// Collect enumerated lines in order
    ///
    /// Text without any enumerated line becomes a single task holding the
    /// whole trimmed response. Blank text yields an empty list.
    pub fn parse(&self, text: &str) -> Vec<String> {
        let tasks: Vec<String> = text
            .lines()
            .filter_map(|line| self.enumerated.captures(line))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|task| !task.is_empty())
            .collect();

        if !tasks.is_empty() {
            return tasks;
        }

        let whole = text.trim();
        if whole.is_empty() {
            Vec::new()
        } else {
            vec![whole.to_string()]
        }
    }

    /// Parse planning output into a plan for `goal`
    pub fn plan(&self, goal: &str, text: &str) -> Plan {
        Plan::new(goal, self.parse(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TaskListParser {
        TaskListParser::new().unwrap()
    }

    #[test]
    fn test_mixed_enumerators_keep_order() {
        let tasks = parser().parse("1. Do A\n2. Do B\n- Do C");
        assert_eq!(tasks, vec!["Do A", "Do B", "Do C"]);
    }

    #[test]
    fn test_prose_becomes_single_task() {
        assert_eq!(parser().parse("just prose"), vec!["just prose"]);
        assert_eq!(
            parser().parse("  line one\nline two  \n"),
            vec!["line one\nline two"]
        );
    }

    #[test]
    fn test_non_enumerated_lines_are_skipped() {
        let text = "Here is your plan:\n\n  * Gather data \n10. Train model\nThanks!";
        assert_eq!(parser().parse(text), vec!["Gather data", "Train model"]);
    }

    #[test]
    fn test_enumerator_needs_whitespace() {
        // "-flag" and "3.14" are not list items
        assert_eq!(parser().parse("-flag\n3.14"), vec!["-flag\n3.14"]);
    }

    #[test]
    fn test_blank_text_has_no_tasks() {
        assert!(parser().parse("   \n ").is_empty());
    }

    #[test]
    fn test_fallback_plan() {
        let plan = fallback_plan("Build a CRM");
        assert_eq!(plan.goal, "Build a CRM");
        assert_eq!(plan.task_count(), 5);
        assert_eq!(plan.tasks[0], "Define requirements");
        assert_eq!(plan.tasks[4], "Deploy and monitor");
    }

    #[test]
    fn test_plan_serializes_with_tasks_field() {
        let plan = parser().plan("goal", "- a\n- b");
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["goal"], "goal");
        assert_eq!(value["tasks"], serde_json::json!(["a", "b"]));
    }
}
