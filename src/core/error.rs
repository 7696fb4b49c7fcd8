//! Error types for the camera ingest tool
//!
//! Only [`IngestError::DeviceEnumeration`] is fatal to a run. Every other
//! variant is caught by the orchestrator and turned into a reported outcome.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the ingestion pipeline
#[derive(Error, Debug)]
pub enum IngestError {
    /// The device catalog service could not be reached
    #[error("Device enumeration failed: {0}")]
    DeviceEnumeration(String),

    /// A named property is absent on a device or item
    #[error("Property '{key}' not found")]
    PropertyMissing { key: String },

    /// A property exists but carries a value of the wrong kind
    #[error("Property '{key}' has an unexpected value: {found}")]
    PropertyType { key: String, found: String },

    /// The capture time could not be reduced to a concrete instant
    #[error("Capture time could not be resolved: {0}")]
    TimestampUnresolvable(String),

    /// The item failed the size-based transferability check
    #[error("'{item}' is not transferable: {reason}")]
    NotTransferable { item: String, reason: String },

    /// Content materialization or persistence failed
    #[error("Transfer failed for '{item}': {message}")]
    Transfer { item: String, message: String },

    /// Filesystem timestamps could not be applied after a copy
    #[error("Failed to apply timestamps to '{}': {message}", path.display())]
    TimestampApplication { path: PathBuf, message: String },

    /// Connecting to a device failed
    #[error("Failed to connect to '{device}': {message}")]
    DeviceConnection { device: String, message: String },

    /// Access to the device was denied
    #[error("Access denied. Please unlock the camera and allow the connection.")]
    AccessDenied,

    /// General I/O error
    #[error("IO error: {0}")]
    Io(String),

    /// COM library initialization failed
    #[cfg(windows)]
    #[error("COM initialization failed: {0}")]
    Com(String),

    /// Windows API error
    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),
}

impl IngestError {
    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::DeviceEnumeration(_))
    }

    pub(crate) fn property_missing(key: &str) -> Self {
        IngestError::PropertyMissing {
            key: key.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, IngestError>;

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err.to_string())
    }
}
