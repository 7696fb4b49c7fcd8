//! Filesystem timestamp reconciliation
//!
//! After a copy, the file's times are rewritten to the device capture time.
//! Device clocks are treated as UTC-like and corrected by a fixed local
//! offset: the applied time is `instant - offset`, written as UTC.
//!
//! Two updates are made and both are always attempted: accessed + modified
//! time, then creation time. An offset that pushes the corrected time out of
//! the representable range fails both steps without touching the file. Creation time can only be set on Windows and
//! macOS; elsewhere that step reports `Unsupported`.

use crate::core::error::IngestError;
use chrono::{NaiveDateTime, TimeDelta};
use log::{debug, warn};
use serde::Serialize;
use std::fs::{FileTimes, OpenOptions};
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Default correction applied to device time, in minutes
pub const DEFAULT_OFFSET_MINUTES: i64 = 120;

/// Largest accepted offset in either direction (one year)
pub const MAX_OFFSET_MINUTES: i64 = 366 * 24 * 60;

/// Check that an offset is within [`MAX_OFFSET_MINUTES`]
pub fn validate_offset_minutes(minutes: i64) -> Result<i64, String> {
    if minutes.checked_abs().is_some_and(|m| m <= MAX_OFFSET_MINUTES) {
        Ok(minutes)
    } else {
        Err(format!(
            "offset of {} minutes is outside -{max}..={max}",
            minutes,
            max = MAX_OFFSET_MINUTES
        ))
    }
}

/// Result of one timestamp update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepStatus {
    Applied,
    /// The platform has no way to perform this update
    Unsupported,
    Failed(String),
}

impl StepStatus {
    fn from_io(result: io::Result<()>) -> Self {
        match result {
            Ok(()) => StepStatus::Applied,
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }
}

/// Outcome of reconciling one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// The corrected time written to the file, if it could be computed
    pub applied: Option<NaiveDateTime>,
    /// Accessed + modified time update
    pub modified: StepStatus,
    /// Creation time update
    pub created: StepStatus,
}

impl Reconciliation {
    /// Whether no step failed
    pub fn is_complete(&self) -> bool {
        !matches!(self.modified, StepStatus::Failed(_))
            && !matches!(self.created, StepStatus::Failed(_))
    }

    /// Failed steps as errors, for reporting
    pub fn failures(&self, path: &Path) -> Vec<IngestError> {
        [("modification time", &self.modified), ("creation time", &self.created)]
            .into_iter()
            .filter_map(|(what, status)| match status {
                StepStatus::Failed(message) => Some(IngestError::TimestampApplication {
                    path: path.to_path_buf(),
                    message: format!("{}: {}", what, message),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Applies corrected capture times to copied files
#[derive(Debug, Clone, Copy)]
pub struct TimestampReconciler {
    offset_minutes: i64,
}

impl Default for TimestampReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_OFFSET_MINUTES)
    }
}

impl TimestampReconciler {
    pub fn new(offset_minutes: i64) -> Self {
        Self { offset_minutes }
    }

    pub fn offset_minutes(&self) -> i64 {
        self.offset_minutes
    }

    /// The time that will be written for a device instant
    ///
    /// `None` when the offset or the result is out of range.
    pub fn corrected(&self, instant: NaiveDateTime) -> Option<NaiveDateTime> {
        TimeDelta::try_minutes(self.offset_minutes)
            .and_then(|offset| instant.checked_sub_signed(offset))
    }

    /// Rewrite the file's times to the corrected capture time
    pub fn apply(&self, path: &Path, instant: NaiveDateTime) -> Reconciliation {
        let Some(applied) = self.corrected(instant) else {
            let message = format!(
                "{} minus {} minutes is out of range",
                instant, self.offset_minutes
            );
            warn!("Not setting times for {}: {}", path.display(), message);
            return Reconciliation {
                applied: None,
                modified: StepStatus::Failed(message.clone()),
                created: StepStatus::Failed(message),
            };
        };
        let time = SystemTime::from(applied.and_utc());

        let modified = StepStatus::from_io(set_accessed_and_modified(path, time));
        if let StepStatus::Failed(ref e) = modified {
            warn!("Error setting modification time for {}: {}", path.display(), e);
        }

        let created = set_created(path, time);
        match created {
            StepStatus::Applied => debug!("Set creation time for {}", path.display()),
            StepStatus::Unsupported => {
                debug!("Creation time not settable on this platform, left as is")
            }
            StepStatus::Failed(ref e) => {
                warn!("Error setting creation time for {}: {}", path.display(), e)
            }
        }

        Reconciliation {
            applied: Some(applied),
            modified,
            created,
        }
    }
}

fn set_accessed_and_modified(path: &Path, time: SystemTime) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_times(FileTimes::new().set_accessed(time).set_modified(time))
}

#[cfg(windows)]
fn set_created(path: &Path, time: SystemTime) -> StepStatus {
    use std::os::windows::fs::FileTimesExt;

    StepStatus::from_io(
        OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_times(FileTimes::new().set_created(time))),
    )
}

#[cfg(target_os = "macos")]
fn set_created(path: &Path, time: SystemTime) -> StepStatus {
    use std::os::macos::fs::FileTimesExt;

    StepStatus::from_io(
        OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_times(FileTimes::new().set_created(time))),
    )
}

#[cfg(not(any(windows, target_os = "macos")))]
fn set_created(_path: &Path, _time: SystemTime) -> StepStatus {
    StepStatus::Unsupported
}
