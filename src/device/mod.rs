//! Device interaction module
//!
//! # Submodules
//!
//! - `traits` - The device contract consumed by the pipeline
//! - `classifier` - Deciding which devices are cameras
//! - `wpd` - Windows Portable Devices backend (Windows only)
//!
//! Both the WPD backend and the mock devices in [`crate::testdb`] implement
//! the traits, so the pipeline runs unchanged against either.

pub mod classifier;
pub mod traits;
#[cfg(windows)]
pub mod wpd;

pub use classifier::{Classification, DeviceClassifier};
pub use traits::{
    CaptureDeviceTrait, DeviceCatalogTrait, DeviceItem, DeviceSessionTrait, PropertyBag,
    PropertyValue,
};

#[cfg(windows)]
pub use wpd::{initialize_com, ComGuard, WpdCatalog};

/// The platform device catalog
#[cfg(windows)]
pub fn platform_catalog() -> crate::core::error::Result<WpdCatalog> {
    WpdCatalog::new()
}

/// The platform device catalog
///
/// Only Windows exposes a device service; elsewhere enumeration always fails.
#[cfg(not(windows))]
pub fn platform_catalog() -> crate::core::error::Result<UnsupportedCatalog> {
    Ok(UnsupportedCatalog)
}

/// Catalog used on platforms without a supported device service
#[cfg(not(windows))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCatalog;

#[cfg(not(windows))]
impl DeviceCatalogTrait for UnsupportedCatalog {
    type Device = crate::testdb::MockDevice;

    fn list_devices(&self) -> crate::core::error::Result<Vec<Self::Device>> {
        Err(crate::core::error::IngestError::DeviceEnumeration(
            "no portable device service on this platform".to_string(),
        ))
    }
}
