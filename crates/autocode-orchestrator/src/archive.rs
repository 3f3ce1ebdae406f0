//! Long-term archive of context snapshots
//!
//! The pipeline hands the final snapshot to a [`ContextSink`] and does not
//! depend on the outcome. The shipped sink flattens the snapshot into short
//! text records and appends them to a JSON Lines file.

use async_trait::async_trait;
use autocode_core::{ContextSnapshot, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// One flattened, searchable record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub content: String,
    pub source: String,
}

/// Receives the final context snapshot of a run
#[async_trait]
pub trait ContextSink: Send + Sync {
    /// Store the snapshot and return the number of records written
    async fn store(&self, snapshot: &ContextSnapshot) -> Result<usize>;
}

/// Appends flattened records to a JSONL file
#[derive(Debug, Clone)]
pub struct JsonlArchive {
    path: PathBuf,
}

impl JsonlArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ContextSink for JsonlArchive {
    async fn store(&self, snapshot: &ContextSnapshot) -> Result<usize> {
        let records = flatten(&serde_json::to_value(snapshot)?);

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        let mut buffer = String::new();
        for record in &records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;

        debug!("Archived {} records to {}", records.len(), self.path.display());
        Ok(records.len())
    }
}

/// Flatten the top level of a snapshot into `key: value` records
///
/// Scalars become `key: value`, list items `key[i]: item`, and map entries
/// `key.sub: value`. Nulls produce nothing.
pub fn flatten(snapshot: &Value) -> Vec<ArchiveRecord> {
    let mut records = Vec::new();
    let Some(fields) = snapshot.as_object() else {
        return records;
    };

    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    records.push(record(format!("{}[{}]: {}", key, idx, render(item))));
                }
            }
            Value::Object(map) => {
                for (sub, item) in map {
                    records.push(record(format!("{}.{}: {}", key, sub, render(item))));
                }
            }
            scalar => records.push(record(format!("{}: {}", key, render(scalar)))),
        }
    }
    records
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn record(content: String) -> ArchiveRecord {
    ArchiveRecord {
        content,
        source: "context".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocode_core::Context;
    use serde_json::json;
    use tempfile::TempDir;

    fn contents(records: &[ArchiveRecord]) -> Vec<&str> {
        records.iter().map(|r| r.content.as_str()).collect()
    }

    #[test]
    fn test_flatten_shapes() {
        let value = json!({
            "current_goal": "Todo app",
            "task_list": ["Model", "API"],
            "variables": {"dockerfile": "FROM rust", "estimate": {"weeks": 52}},
            "nothing": null
        });

        let records = flatten(&value);
        assert_eq!(
            contents(&records),
            vec![
                "current_goal: Todo app",
                "task_list[0]: Model",
                "task_list[1]: API",
                "variables.dockerfile: FROM rust",
                "variables.estimate: {\"weeks\":52}",
            ]
        );
        assert!(records.iter().all(|r| r.source == "context"));
    }

    #[test]
    fn test_flatten_non_object() {
        assert!(flatten(&json!("text")).is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_archive_appends() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("archive.jsonl");
        let archive = JsonlArchive::new(&path);

        let mut ctx = Context::new();
        ctx.set_goal("Todo app").unwrap();
        ctx.add_task("Model");

        let first = archive.store(&ctx.snapshot()).await.unwrap();
        let second = archive.store(&ctx.snapshot()).await.unwrap();
        assert_eq!(first, second);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), first * 2);

        let parsed: ArchiveRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.content, "current_goal: Todo app");
    }
}
