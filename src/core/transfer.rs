//! Item content transfer
//!
//! Copies one item from an open device session to its planned destination.
//! An item is transferable only when it reports a size greater than zero;
//! anything else is skipped before a file is created.

use crate::core::error::{IngestError, Result};
use crate::core::metadata::ItemMetadata;
use crate::core::planner::{DestinationPlan, PathPlanner};
use crate::device::traits::DeviceSessionTrait;
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-item result of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Content was written; `applied_timestamp` is set once reconciled
    Copied {
        path: PathBuf,
        bytes: u64,
        applied_timestamp: Option<NaiveDateTime>,
    },
    /// The item failed the transferability check
    SkippedNotTransferable { reason: String },
    /// Reading or writing the content failed
    Failed { reason: String },
}

impl TransferOutcome {
    pub fn is_copied(&self) -> bool {
        matches!(self, TransferOutcome::Copied { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TransferOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TransferOutcome::SkippedNotTransferable { .. })
    }
}

/// Check the size-based transferability rule, returning the size
pub fn ensure_transferable(metadata: &ItemMetadata) -> Result<u64> {
    match metadata.size {
        Some(size) if size > 0 => Ok(size as u64),
        Some(size) => Err(IngestError::NotTransferable {
            item: metadata.file_name(),
            reason: format!("reported size is {} bytes", size),
        }),
        None => Err(IngestError::NotTransferable {
            item: metadata.file_name(),
            reason: "no size reported".to_string(),
        }),
    }
}

/// Copies item content from a device session to local storage
pub struct TransferEngine<'a> {
    planner: &'a PathPlanner,
}

impl<'a> TransferEngine<'a> {
    pub fn new(planner: &'a PathPlanner) -> Self {
        Self { planner }
    }

    /// Transfer one item
    ///
    /// Returns `Ok(SkippedNotTransferable)` for items failing the size check
    /// and `Err` when the content could not be read or written; the caller
    /// turns the latter into `Failed`.
    pub fn transfer<S: DeviceSessionTrait>(
        &self,
        session: &S,
        item_id: &str,
        metadata: &ItemMetadata,
        plan: DestinationPlan,
    ) -> Result<TransferOutcome> {
        if let Err(e) = ensure_transferable(metadata) {
            let reason = match e {
                IngestError::NotTransferable { reason, .. } => reason,
                other => other.to_string(),
            };
            return Ok(TransferOutcome::SkippedNotTransferable { reason });
        }

        self.planner.ensure_directory(&plan)?;
        let plan = self.planner.resolve_collision(plan);

        let data = session.read_item(item_id).map_err(|e| match e {
            IngestError::Transfer { .. } => e,
            other => IngestError::Transfer {
                item: metadata.file_name(),
                message: other.to_string(),
            },
        })?;

        write_file(&plan.file, &data).map_err(|e| IngestError::Transfer {
            item: metadata.file_name(),
            message: e.to_string(),
        })?;

        let bytes = data.len() as u64;
        debug!("Wrote {} ({} bytes)", plan.file.display(), bytes);

        Ok(TransferOutcome::Copied {
            path: plan.file,
            bytes,
            applied_timestamp: None,
        })
    }
}

/// Write content to a file, removing the partial file on failure
fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        IngestError::Io(format!("Failed to create file '{}': {}", path.display(), e))
    })?;

    if let Err(e) = file.write_all(data).and_then(|_| file.flush()) {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path) {
            warn!(
                "Failed to remove partial file '{}': {}",
                path.display(),
                remove_err
            );
        }
        return Err(IngestError::Io(format!(
            "Failed to write file '{}': {}",
            path.display(),
            e
        )));
    }

    Ok(())
}
