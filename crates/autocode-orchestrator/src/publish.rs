//! Publishing generated project files

use async_trait::async_trait;
use autocode_core::{AutocodeError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Files making up a generated project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishBundle {
    /// Project name, used as the destination directory
    pub name: String,
    /// Relative path and content of each file
    pub files: Vec<(String, String)>,
}

/// Destination for a generated project (allows mocking in tests)
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish the bundle and return where it can be found
    async fn publish(&self, bundle: &PublishBundle) -> Result<String>;
}

/// Writes each bundle to `<root>/<name>/`
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    root: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Publisher for DirectoryPublisher {
    async fn publish(&self, bundle: &PublishBundle) -> Result<String> {
        let nested = bundle.name.contains(|c: char| c == '/' || c == '\\');
        if bundle.name.is_empty() || nested || bundle.name == ".." {
            return Err(AutocodeError::InvalidInput(format!(
                "Invalid project name: '{}'",
                bundle.name
            )));
        }

        let dir = self.root.join(&bundle.name);
        tokio::fs::create_dir_all(&dir).await?;

        for (relative, content) in &bundle.files {
            tokio::fs::write(dir.join(relative), content).await?;
        }

        info!(
            "Published {} files to {}",
            bundle.files.len(),
            dir.display()
        );
        Ok(dir.display().to_string())
    }
}

/// Directory-safe slug of a project goal
///
/// Keeps ASCII alphanumerics, collapses everything else into single hyphens,
/// and caps the length. An idea with no usable characters becomes `project`.
pub fn project_slug(goal: &str) -> String {
    const MAX_LEN: usize = 48;

    let mut slug = String::new();
    for c in goal.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= MAX_LEN {
            break;
        }
    }

    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug.to_string()
    }
}
