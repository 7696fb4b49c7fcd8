//! Mock device implementation for testing without a real camera
//!
//! This module provides mock implementations of the device traits that
//! simulate a device catalog with configurable devices, items and failures.

use crate::core::error::{IngestError, Result};
use crate::device::traits::{
    keys, CaptureDeviceTrait, DeviceCatalogTrait, DeviceItem, DeviceSessionTrait, PropertyBag,
    PropertyValue,
};
use chrono::NaiveDateTime;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// An item stored on a mock device
#[derive(Debug, Clone)]
pub struct MockItem {
    /// Unique item ID on the device
    pub item_id: String,
    /// Reported properties
    pub properties: PropertyBag,
    /// Content returned by `read_item` (None simulates an unreadable item)
    pub content: Option<Vec<u8>>,
}

impl MockItem {
    /// Create a photo item whose size matches its content
    pub fn photo(
        item_id: &str,
        name: &str,
        extension: &str,
        content: Vec<u8>,
        taken: Option<NaiveDateTime>,
    ) -> Self {
        let mut properties = PropertyBag::new()
            .with(keys::ITEM_NAME, PropertyValue::Text(name.to_string()))
            .with(
                keys::FILENAME_EXTENSION,
                PropertyValue::Text(extension.to_string()),
            )
            .with(keys::ITEM_SIZE, PropertyValue::Integer(content.len() as i64));
        if let Some(taken) = taken {
            properties.insert(keys::ITEM_TIME_STAMP, PropertyValue::Date(taken));
        }

        Self {
            item_id: item_id.to_string(),
            properties,
            content: Some(content),
        }
    }

    /// Create an item from an arbitrary property bag
    pub fn with_properties(item_id: &str, properties: PropertyBag, content: Option<Vec<u8>>) -> Self {
        Self {
            item_id: item_id.to_string(),
            properties,
            content,
        }
    }

    /// Override a single property
    pub fn set(mut self, key: &str, value: PropertyValue) -> Self {
        self.properties.insert(key, value);
        self
    }
}

/// Configuration for mock device behavior
#[derive(Debug, Clone, Default)]
pub struct MockDeviceConfig {
    /// Simulate device being locked (connect is denied)
    pub simulate_locked: bool,
    /// Simulate disconnection after N item reads
    pub disconnect_after_reads: Option<usize>,
    /// Item IDs that fail to read
    pub read_error_items: Vec<String>,
    /// Simulate item enumeration failing after connect
    pub fail_item_listing: bool,
}

impl MockDeviceConfig {
    /// Create a config that simulates a locked device
    pub fn locked() -> Self {
        Self {
            simulate_locked: true,
            ..Default::default()
        }
    }

    /// Create a config that simulates disconnection after N reads
    pub fn disconnect_after(reads: usize) -> Self {
        Self {
            disconnect_after_reads: Some(reads),
            ..Default::default()
        }
    }

    /// Create a config where listing items fails after connecting
    pub fn listing_fails() -> Self {
        Self {
            fail_item_listing: true,
            ..Default::default()
        }
    }

    /// Add specific items that should fail to read
    pub fn with_read_errors(mut self, item_ids: Vec<String>) -> Self {
        self.read_error_items = item_ids;
        self
    }
}

/// A simulated device in the catalog
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    properties: HashMap<String, String>,
    items: Vec<MockItem>,
    config: MockDeviceConfig,
}

impl MockDevice {
    /// Create a device with a `Name` property
    pub fn named(name: &str) -> Self {
        let mut device = Self::default();
        device
            .properties
            .insert(keys::NAME.to_string(), name.to_string());
        device
    }

    /// Create a device without a `Name` property
    pub fn unnamed() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_items(mut self, items: Vec<MockItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_config(mut self, config: MockDeviceConfig) -> Self {
        self.config = config;
        self
    }
}

impl CaptureDeviceTrait for MockDevice {
    type Session = MockSession;

    fn property_value(&self, key: &str) -> Result<String> {
        self.properties
            .get(key)
            .cloned()
            .ok_or_else(|| IngestError::property_missing(key))
    }

    fn connect(&self) -> Result<MockSession> {
        if self.config.simulate_locked {
            return Err(IngestError::AccessDenied);
        }

        Ok(MockSession {
            items: Rc::new(self.items.clone()),
            config: self.config.clone(),
            read_count: Cell::new(0),
        })
    }
}

/// An open session on a [`MockDevice`]
#[derive(Debug)]
pub struct MockSession {
    items: Rc<Vec<MockItem>>,
    config: MockDeviceConfig,
    read_count: Cell<usize>,
}

impl MockSession {
    /// Number of reads performed so far
    pub fn read_count(&self) -> usize {
        self.read_count.get()
    }
}

impl DeviceSessionTrait for MockSession {
    fn items(&self) -> Result<Vec<DeviceItem>> {
        if self.config.fail_item_listing {
            return Err(IngestError::DeviceConnection {
                device: "mock".to_string(),
                message: "Simulated enumeration failure".to_string(),
            });
        }

        Ok(self
            .items
            .iter()
            .map(|item| DeviceItem::new(&item.item_id, item.properties.clone()))
            .collect())
    }

    fn read_item(&self, item_id: &str) -> Result<Vec<u8>> {
        let reads = self.read_count.get() + 1;
        self.read_count.set(reads);

        if let Some(limit) = self.config.disconnect_after_reads {
            if reads > limit {
                return Err(IngestError::Transfer {
                    item: item_id.to_string(),
                    message: "Device disconnected during transfer".to_string(),
                });
            }
        }

        if self.config.read_error_items.iter().any(|id| id == item_id) {
            return Err(IngestError::Transfer {
                item: item_id.to_string(),
                message: "Simulated read error".to_string(),
            });
        }

        let item = self
            .items
            .iter()
            .find(|item| item.item_id == item_id)
            .ok_or_else(|| IngestError::Transfer {
                item: item_id.to_string(),
                message: "Item not found".to_string(),
            })?;

        item.content.clone().ok_or_else(|| IngestError::Transfer {
            item: item_id.to_string(),
            message: "No content available".to_string(),
        })
    }
}

/// Mock device catalog
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    devices: Vec<MockDevice>,
    unavailable: bool,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog whose service cannot be reached
    pub fn unavailable() -> Self {
        Self {
            devices: Vec::new(),
            unavailable: true,
        }
    }

    pub fn with_device(mut self, device: MockDevice) -> Self {
        self.devices.push(device);
        self
    }
}

impl DeviceCatalogTrait for MockCatalog {
    type Device = MockDevice;

    fn list_devices(&self) -> Result<Vec<MockDevice>> {
        if self.unavailable {
            return Err(IngestError::DeviceEnumeration(
                "Simulated device service outage".to_string(),
            ));
        }
        Ok(self.devices.clone())
    }
}
