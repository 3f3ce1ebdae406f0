//! Session persistence
//!
//! One pretty-printed JSON file per session id under a root directory. A
//! session that was never saved loads as an empty context.

use autocode_core::{AutocodeError, Context, ContextSnapshot, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stores context snapshots keyed by session id
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot file for a session id
    pub fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.root.join(format!("{}.json", session_id)))
    }

    /// Write the context under `session_id`, replacing any earlier snapshot
    pub async fn save(&self, ctx: &Context, session_id: &str) -> Result<PathBuf> {
        let path = self.path_for(session_id)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let json = serde_json::to_string_pretty(&ctx.snapshot())?;
        tokio::fs::write(&path, json).await?;

        info!("Context saved to {}", path.display());
        Ok(path)
    }

    /// Load the context saved under `session_id`, or an empty one
    pub async fn load(&self, session_id: &str) -> Result<Context> {
        let path = self.path_for(session_id)?;
        if !tokio::fs::try_exists(&path).await? {
            debug!("No saved context for session '{}'", session_id);
            return Ok(Context::new());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let snapshot: ContextSnapshot = serde_json::from_str(&content)?;
        Ok(Context::from_snapshot(snapshot))
    }

    /// Stored session ids, sorted
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }
}

/// Write a timestamped copy of the context into `dir`
///
/// The file is named `context_snapshot_<YYYY-mm-dd_HH-MM-SS>.json`.
pub async fn export_snapshot(ctx: &Context, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = dir.join(format!("context_snapshot_{}.json", stamp));
    let json = serde_json::to_string_pretty(&ctx.snapshot())?;
    tokio::fs::write(&path, json).await?;

    debug!("Snapshot exported to {}", path.display());
    Ok(path)
}

fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(AutocodeError::InvalidInput(
            "Session id cannot be empty".to_string(),
        ));
    }
    if session_id.contains(|c: char| c == '/' || c == '\\') || session_id.contains("..") {
        return Err(AutocodeError::InvalidInput(format!(
            "Session id '{}' must not contain path separators or '..'",
            session_id
        )));
    }
    Ok(())
}
