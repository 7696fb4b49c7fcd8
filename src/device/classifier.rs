//! Capture device classification
//!
//! Camera firmware reports inconsistent, vendor-specific names, so a device is
//! eligible when its `Name` property contains any fragment from an allow-list.
//! Matching is a plain case-sensitive substring test.

use crate::device::traits::CaptureDeviceTrait;
use log::debug;

/// Name fragments recognised out of the box
pub const DEFAULT_NAME_FRAGMENTS: &[&str] = &["Camera", "X-T30"];

/// Result of classifying a discovered device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The device should be ingested
    Eligible { name: String },
    /// The device is not a capture device
    NotCamera { name: String },
    /// The device reports no `Name` property
    Unnamed,
}

impl Classification {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Classification::Eligible { .. })
    }

    /// Name to show in diagnostics
    pub fn display_name(&self) -> &str {
        match self {
            Classification::Eligible { name } | Classification::NotCamera { name } => name,
            Classification::Unnamed => "(unnamed device)",
        }
    }
}

/// Decides which devices are capture devices
#[derive(Debug, Clone)]
pub struct DeviceClassifier {
    fragments: Vec<String>,
}

impl Default for DeviceClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_FRAGMENTS.iter().map(|s| s.to_string()).collect())
    }
}

impl DeviceClassifier {
    /// Create a classifier; empty fragments are ignored
    pub fn new(fragments: Vec<String>) -> Self {
        Self {
            fragments: fragments.into_iter().filter(|f| !f.is_empty()).collect(),
        }
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Whether a device name contains any allow-listed fragment
    pub fn is_eligible_name(&self, name: &str) -> bool {
        self.fragments.iter().any(|fragment| name.contains(fragment.as_str()))
    }

    /// Classify a device by its `Name` property
    ///
    /// A missing name fails closed: the device is reported as `Unnamed` and
    /// never ingested.
    pub fn classify<D: CaptureDeviceTrait>(&self, device: &D) -> Classification {
        match device.name() {
            Some(name) if self.is_eligible_name(&name) => Classification::Eligible { name },
            Some(name) => Classification::NotCamera { name },
            None => {
                debug!("Device has no Name property, treating as non-camera");
                Classification::Unnamed
            }
        }
    }
}
