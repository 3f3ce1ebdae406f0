//! Context store for a single pipeline run
//!
//! The context is the only mutable state a run carries. Every mutation other
//! than [`Context::restore`] and [`Context::reset`] leaves exactly one entry in
//! the history log, so the log doubles as an audit trail of the run.

use crate::{AutocodeError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Maximum characters of a variable value rendered into its history detail
const VARIABLE_PREVIEW_CHARS: usize = 200;

/// One record in the history log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub event: String,
    pub detail: String,
    /// Insertion index in the log
    pub position: usize,
}

/// Plain-data copy of a context, as persisted on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    #[serde(default)]
    pub current_goal: Option<String>,
    #[serde(default)]
    pub task_list: Vec<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
}

/// Mutable state accumulated during one orchestration run
#[derive(Debug, Clone, Default)]
pub struct Context {
    state: ContextSnapshot,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a previously taken snapshot
    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        let mut ctx = Self::new();
        ctx.restore(snapshot);
        ctx
    }

    /// Set the goal for this session. The goal can only be set once.
    pub fn set_goal(&mut self, goal: impl Into<String>) -> Result<()> {
        if let Some(existing) = &self.state.current_goal {
            return Err(AutocodeError::InvalidInput(format!(
                "Goal already set to '{}'",
                existing
            )));
        }
        let goal = goal.into();
        self.state.current_goal = Some(goal.clone());
        self.append_history("Goal set", goal);
        Ok(())
    }

    /// Append a task to the end of the task list
    pub fn add_task(&mut self, task: impl Into<String>) {
        let task = task.into();
        self.state.task_list.push(task.clone());
        self.append_history("Task added", task);
    }

    /// Remove the first task equal to `task`.
    ///
    /// Removal is idempotent: an absent task is not an error and leaves both
    /// the task list and the history untouched. Returns whether a task was
    /// removed.
    pub fn complete_task(&mut self, task: &str) -> bool {
        match self.state.task_list.iter().position(|t| t == task) {
            Some(idx) => {
                let removed = self.state.task_list.remove(idx);
                self.append_history("Task completed", removed);
                true
            }
            None => {
                debug!(task, "complete_task: task not in list, ignoring");
                false
            }
        }
    }

    /// Set or overwrite a variable
    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let detail = format!("{} = {}", key, preview(&value));
        self.state.variables.insert(key, value);
        self.append_history("Variable updated", detail);
    }

    /// Get a variable by key
    pub fn get_variable(&self, key: &str) -> Option<&Value> {
        self.state.variables.get(key)
    }

    /// Get a variable and deserialize it into `T`
    pub fn get_variable_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.state.variables.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Get a string variable, if present and a string
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get_variable(key).and_then(Value::as_str)
    }

    /// Append a record to the history log
    pub fn append_history(&mut self, event: impl Into<String>, detail: impl Into<String>) {
        let position = self.state.history.len();
        self.state.history.push(HistoryEntry {
            event: event.into(),
            detail: detail.into(),
            position,
        });
    }

    pub fn goal(&self) -> Option<&str> {
        self.state.current_goal.as_deref()
    }

    pub fn tasks(&self) -> &[String] {
        &self.state.task_list
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.state.variables
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.state == ContextSnapshot::default()
    }

    /// Take a plain-data copy of the current state
    pub fn snapshot(&self) -> ContextSnapshot {
        self.state.clone()
    }

    /// Replace all four fields wholesale with the snapshot's (no merge)
    pub fn restore(&mut self, snapshot: ContextSnapshot) {
        self.state = snapshot;
    }

    /// Clear everything, as at session start
    pub fn reset(&mut self) {
        self.state = ContextSnapshot::default();
    }
}

fn preview(value: &Value) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if rendered.chars().count() <= VARIABLE_PREVIEW_CHARS {
        rendered
    } else {
        let cut: String = rendered.chars().take(VARIABLE_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mutations_append_one_history_record_each() {
        let mut ctx = Context::new();
        ctx.set_goal("Build a todo app").unwrap();
        ctx.add_task("Design schema");
        ctx.set_variable("plan", json!({"tasks": ["a"]}));
        ctx.complete_task("Design schema");
        ctx.append_history("Custom", "detail");

        let events: Vec<&str> = ctx.history().iter().map(|h| h.event.as_str()).collect();
        assert_eq!(
            events,
            vec![
                "Goal set",
                "Task added",
                "Variable updated",
                "Task completed",
                "Custom"
            ]
        );
        for (idx, entry) in ctx.history().iter().enumerate() {
            assert_eq!(entry.position, idx);
        }
    }

    #[test]
    fn test_goal_is_set_once() {
        let mut ctx = Context::new();
        ctx.set_goal("first").unwrap();
        let err = ctx.set_goal("second").unwrap_err();
        assert!(matches!(err, AutocodeError::InvalidInput(_)));
        assert_eq!(ctx.goal(), Some("first"));
        assert_eq!(ctx.history().len(), 1);
    }

    #[test]
    fn test_complete_missing_task_is_silent() {
        let mut ctx = Context::new();
        ctx.add_task("a");
        let before = ctx.history().len();

        assert!(!ctx.complete_task("never added"));
        assert_eq!(ctx.tasks(), &["a".to_string()]);
        assert_eq!(ctx.history().len(), before);
    }

    #[test]
    fn test_complete_task_removes_first_match_only() {
        let mut ctx = Context::new();
        ctx.add_task("dup");
        ctx.add_task("other");
        ctx.add_task("dup");

        assert!(ctx.complete_task("dup"));
        assert_eq!(ctx.tasks(), &["other".to_string(), "dup".to_string()]);
    }

    #[test]
    fn test_variable_overwrite_logs_again() {
        let mut ctx = Context::new();
        ctx.set_variable("k", json!(1));
        ctx.set_variable("k", json!(2));

        assert_eq!(ctx.get_variable("k"), Some(&json!(2)));
        assert_eq!(ctx.variables().len(), 1);
        assert_eq!(ctx.history().len(), 2);
        assert_eq!(ctx.history()[1].detail, "k = 2");
    }

    #[test]
    fn test_long_variable_detail_is_truncated() {
        let mut ctx = Context::new();
        ctx.set_variable("code", json!("x".repeat(1000)));

        let detail = &ctx.history()[0].detail;
        assert!(detail.ends_with("..."));
        assert!(detail.len() < 300);
        assert_eq!(ctx.get_text("code").unwrap().len(), 1000);
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let mut ctx = Context::new();
        ctx.set_goal("goal").unwrap();
        ctx.add_task("t1");
        ctx.add_task("t2");
        ctx.set_variable("cost", json!({"weeks": 52}));

        let snapshot = ctx.snapshot();
        let mut fresh = Context::new();
        fresh.restore(snapshot.clone());

        assert_eq!(fresh.goal(), ctx.goal());
        assert_eq!(fresh.tasks(), ctx.tasks());
        assert_eq!(fresh.history(), ctx.history());
        assert_eq!(fresh.variables(), ctx.variables());
        assert_eq!(fresh.snapshot(), snapshot);
    }

    #[test]
    fn test_restore_replaces_instead_of_merging() {
        let mut ctx = Context::new();
        ctx.set_variable("stale", json!(true));
        ctx.add_task("stale task");

        let mut other = Context::new();
        other.set_goal("new goal").unwrap();
        ctx.restore(other.snapshot());

        assert_eq!(ctx.goal(), Some("new goal"));
        assert!(ctx.tasks().is_empty());
        assert!(ctx.get_variable("stale").is_none());
        assert_eq!(ctx.history().len(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ctx = Context::new();
        ctx.set_goal("g").unwrap();
        ctx.reset();
        assert!(ctx.is_empty());
        // goal can be set again after a reset
        ctx.set_goal("g2").unwrap();
    }

    #[test]
    fn test_snapshot_json_has_exactly_four_fields() {
        let mut ctx = Context::new();
        ctx.set_goal("g").unwrap();
        let value = serde_json::to_value(ctx.snapshot()).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["current_goal", "history", "task_list", "variables"]);
    }

    #[test]
    fn test_get_variable_as_typed() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Weeks {
            weeks: u32,
        }

        let mut ctx = Context::new();
        ctx.set_variable("w", json!({"weeks": 4}));
        let weeks: Option<Weeks> = ctx.get_variable_as("w").unwrap();
        assert_eq!(weeks, Some(Weeks { weeks: 4 }));
        assert!(ctx.get_variable_as::<Weeks>("missing").unwrap().is_none());
    }
}
