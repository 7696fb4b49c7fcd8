//! Destination path planning
//!
//! Every item lands in `{root}/{year}/{month}/{name}.{extension}`. Items
//! without a resolved capture time go to the literal
//! `Unknown_Date/Unknown_Date` partition so they are easy to review.

use crate::core::error::{IngestError, Result};
use crate::core::metadata::{ItemMetadata, ResolvedTimestamp};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What to do when the planned file already exists
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the existing file
    #[default]
    Overwrite,
    /// Keep both by adding a numeric suffix to the new file
    Rename,
}

/// Where an item will be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationPlan {
    pub directory: PathBuf,
    pub file: PathBuf,
}

/// Derives destination paths under a root directory
#[derive(Debug, Clone)]
pub struct PathPlanner {
    root: PathBuf,
    collision: CollisionPolicy,
}

impl PathPlanner {
    pub fn new(root: impl Into<PathBuf>, collision: CollisionPolicy) -> Self {
        Self {
            root: root.into(),
            collision,
        }
    }

    /// Plan the destination of an item
    ///
    /// This only computes paths; see [`ensure_directory`](Self::ensure_directory)
    /// and [`resolve_collision`](Self::resolve_collision).
    pub fn plan(&self, timestamp: &ResolvedTimestamp, metadata: &ItemMetadata) -> DestinationPlan {
        let directory = self.root.join(&timestamp.year).join(&timestamp.month);
        let file_name = format!(
            "{}.{}",
            sanitize_component(&metadata.name),
            sanitize_component(&metadata.extension)
        );
        let file = directory.join(file_name);
        trace!("Planned {} -> {}", metadata.file_name(), file.display());

        DestinationPlan { directory, file }
    }

    /// Create the plan's directory and any missing parents
    ///
    /// Succeeds when the directory already exists.
    pub fn ensure_directory(&self, plan: &DestinationPlan) -> Result<()> {
        fs::create_dir_all(&plan.directory).map_err(|e| {
            IngestError::Io(format!(
                "Failed to create directory '{}': {}",
                plan.directory.display(),
                e
            ))
        })
    }

    /// Apply the collision policy to a plan about to be written
    pub fn resolve_collision(&self, plan: DestinationPlan) -> DestinationPlan {
        match self.collision {
            CollisionPolicy::Overwrite => plan,
            CollisionPolicy::Rename if plan.file.exists() => {
                let file = generate_unique_path(&plan.file);
                debug!(
                    "'{}' exists, writing to '{}'",
                    plan.file.display(),
                    file.display()
                );
                DestinationPlan {
                    directory: plan.directory,
                    file,
                }
            }
            CollisionPolicy::Rename => plan,
        }
    }
}

/// Replace path separators and characters Windows rejects in file names
///
/// A `:` would otherwise write to an NTFS alternate data stream.
fn sanitize_component(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// Generate a unique path by adding a numeric suffix
fn generate_unique_path(original_path: &Path) -> PathBuf {
    let stem = original_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let extension = original_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let parent = original_path.parent().unwrap_or(Path::new("."));

    let mut counter = 1;
    loop {
        let new_name = if extension.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, extension)
        };
        let new_path = parent.join(new_name);
        if !new_path.exists() {
            return new_path;
        }
        counter += 1;
    }
}
