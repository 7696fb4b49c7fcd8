//! Device abstraction traits for testability
//!
//! This module defines the contract the ingestion pipeline consumes from the
//! platform device service. Both the real Windows Portable Devices backend and
//! the mock devices in [`crate::testdb`] implement it, so the whole pipeline can
//! be exercised without a camera attached.
//!
//! # Architecture
//!
//! The trait hierarchy is:
//! - `DeviceCatalogTrait` - Enumerates devices
//! - `CaptureDeviceTrait` - Named property lookup and connection
//! - `DeviceSessionTrait` - Item enumeration and content materialization
//! - `PropertyBag` - Heterogeneous per-item properties (shared, not a trait)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use camera_ingest::device::traits::{CaptureDeviceTrait, DeviceCatalogTrait, DeviceSessionTrait};
//!
//! fn count_items<C: DeviceCatalogTrait>(catalog: &C) -> Result<usize, String> {
//!     let mut total = 0;
//!     for device in catalog.list_devices().map_err(|e| e.to_string())? {
//!         let session = device.connect().map_err(|e| e.to_string())?;
//!         total += session.items().map_err(|e| e.to_string())?.len();
//!     }
//!     Ok(total)
//! }
//! ```

use crate::core::error::{IngestError, Result};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Property names understood by the pipeline
pub mod keys {
    /// Device display name
    pub const NAME: &str = "Name";
    /// Device manufacturer
    pub const MANUFACTURER: &str = "Manufacturer";
    /// Device description/model
    pub const DESCRIPTION: &str = "Description";
    /// Item name without extension
    pub const ITEM_NAME: &str = "Item Name";
    /// Item file extension without the leading dot
    pub const FILENAME_EXTENSION: &str = "Filename extension";
    /// Item size in bytes
    pub const ITEM_SIZE: &str = "Item Size";
    /// Device-reported capture time
    pub const ITEM_TIME_STAMP: &str = "Item Time Stamp";
}

/// A single property value as reported by the device service
///
/// Device services report loosely typed values. `Date` is the calendar facet
/// of a timestamp, `Text` its textual facet, and `Opaque` anything the backend
/// could not map (carrying a description for diagnostics).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Date(NaiveDateTime),
    Opaque(String),
}

impl PropertyValue {
    /// Short name of the value kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Text(_) => "text",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Date(_) => "date",
            PropertyValue::Opaque(_) => "opaque",
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(s) => write!(f, "{}", s),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Date(d) => write!(f, "{}", d),
            PropertyValue::Opaque(desc) => write!(f, "<{}>", desc),
        }
    }
}

/// Named properties of a device item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: BTreeMap<String, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: PropertyValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: PropertyValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Look up a property, failing with `PropertyMissing` when absent
    pub fn get(&self, key: &str) -> Result<&PropertyValue> {
        self.values
            .get(key)
            .ok_or_else(|| IngestError::property_missing(key))
    }

    /// Look up a textual property
    pub fn text(&self, key: &str) -> Result<&str> {
        match self.get(key)? {
            PropertyValue::Text(s) => Ok(s),
            other => Err(IngestError::PropertyType {
                key: key.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    /// Look up an integer property
    pub fn integer(&self, key: &str) -> Result<i64> {
        match self.get(key)? {
            PropertyValue::Integer(i) => Ok(*i),
            other => Err(IngestError::PropertyType {
                key: key.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One transferable unit exposed by a connected device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceItem {
    /// Backend-specific identifier used to read the content
    pub item_id: String,
    /// Properties reported for the item
    pub properties: PropertyBag,
}

impl DeviceItem {
    pub fn new(item_id: &str, properties: PropertyBag) -> Self {
        Self {
            item_id: item_id.to_string(),
            properties,
        }
    }
}

/// Trait for the platform device catalog
pub trait DeviceCatalogTrait {
    /// The device type produced by enumeration
    type Device: CaptureDeviceTrait;

    /// Enumerate all devices currently exposed by the service
    ///
    /// An error here means the service itself is unavailable.
    fn list_devices(&self) -> Result<Vec<Self::Device>>;
}

/// Trait for a discovered (not yet connected) device
pub trait CaptureDeviceTrait {
    /// The session type returned by [`connect`](Self::connect)
    type Session: DeviceSessionTrait;

    /// Read a named string property, failing with `PropertyMissing`
    fn property_value(&self, key: &str) -> Result<String>;

    /// The device `Name` property, if the device reports one
    fn name(&self) -> Option<String> {
        self.property_value(keys::NAME).ok()
    }

    /// Open a session on the device
    fn connect(&self) -> Result<Self::Session>;
}

/// Trait for an open device session
pub trait DeviceSessionTrait {
    /// Enumerate the items available on the device
    fn items(&self) -> Result<Vec<DeviceItem>>;

    /// Materialize an item's binary content
    fn read_item(&self, item_id: &str) -> Result<Vec<u8>>;
}

/// Split a device file name into name and extension
///
/// The extension is everything after the last dot. Leading-dot names such as
/// `.hidden` have no extension.
pub fn split_file_name(file_name: &str) -> (String, Option<String>) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < file_name.len() => (
            file_name[..pos].to_string(),
            Some(file_name[pos + 1..].to_string()),
        ),
        _ => (file_name.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_property_bag_lookup() {
        let bag = PropertyBag::new()
            .with(keys::ITEM_NAME, PropertyValue::Text("IMG_0001".into()))
            .with(keys::ITEM_SIZE, PropertyValue::Integer(2048));

        assert_eq!(bag.len(), 2);
        assert_eq!(bag.text(keys::ITEM_NAME).unwrap(), "IMG_0001");
        assert_eq!(bag.integer(keys::ITEM_SIZE).unwrap(), 2048);
        assert!(bag.contains(keys::ITEM_NAME));
        assert!(!bag.contains(keys::ITEM_TIME_STAMP));
    }

    #[test]
    fn test_property_bag_missing_and_wrong_type() {
        let bag = PropertyBag::new().with(keys::ITEM_SIZE, PropertyValue::Text("big".into()));

        assert!(matches!(
            bag.get(keys::ITEM_NAME),
            Err(IngestError::PropertyMissing { ref key }) if key == "Item Name"
        ));
        assert!(matches!(
            bag.integer(keys::ITEM_SIZE),
            Err(IngestError::PropertyType { ref found, .. }) if found == "text"
        ));
    }

    #[test]
    fn test_property_value_display() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        assert_eq!(PropertyValue::Date(date).to_string(), "2024-03-09 14:05:00");
        assert_eq!(PropertyValue::Integer(7).to_string(), "7");
        assert_eq!(PropertyValue::Opaque("VT_BLOB".into()).to_string(), "<VT_BLOB>");
    }

    #[test]
    fn test_split_file_name() {
        let cases = vec![
            ("DSCF0001.JPG", ("DSCF0001", Some("JPG"))),
            ("archive.tar.gz", ("archive.tar", Some("gz"))),
            ("noextension", ("noextension", None)),
            (".hidden", (".hidden", None)),
            ("trailing.", ("trailing.", None)),
        ];

        for (input, (name, ext)) in cases {
            let (n, e) = split_file_name(input);
            assert_eq!(n, name, "name for {}", input);
            assert_eq!(e.as_deref(), ext, "extension for {}", input);
        }
    }
}
