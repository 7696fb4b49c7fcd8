//! Test Database Module
//!
//! Mock devices and canned scenarios for exercising the ingestion pipeline
//! without a camera attached. The `simulate` CLI command runs the pipeline
//! against [`sample_camera_catalog`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use camera_ingest::core::ingest::{IngestConfig, Ingestor};
//! use camera_ingest::testdb::sample_camera_catalog;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! let config = IngestConfig::new("./simulated_import");
//! let ingestor = Ingestor::new(sample_camera_catalog(), config);
//! let report = ingestor.run(Arc::new(AtomicBool::new(false))).unwrap();
//! println!("{}", report.totals());
//! ```

pub mod mock_device;

pub use mock_device::{MockCatalog, MockDevice, MockDeviceConfig, MockItem, MockSession};

use crate::device::traits::{keys, PropertyBag, PropertyValue};
use chrono::{NaiveDate, NaiveDateTime};

/// Build fake JPEG content of roughly `size` bytes
///
/// The data starts with a JPEG SOI/APP0 marker and ends with EOI; `seed`
/// makes the payload distinct per item.
pub fn fake_jpeg(size: usize, seed: u8) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    let body = size.saturating_sub(6);
    data.extend((0..body).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)));
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, min, s))
        .unwrap_or_default()
}

/// A catalog with a camera, a printer and an unnamed device
///
/// The camera holds dated photos across two months, an undated photo, a photo
/// with a textual timestamp and a zero-size item.
pub fn sample_camera_catalog() -> MockCatalog {
    let camera = MockDevice::named("FUJIFILM X-T30")
        .with_property(keys::MANUFACTURER, "FUJIFILM")
        .with_items(vec![
            MockItem::photo(
                "o1",
                "DSCF0001",
                "JPG",
                fake_jpeg(4096, 1),
                Some(at(2024, 6, 1, 9, 15, 0)),
            ),
            MockItem::photo(
                "o2",
                "DSCF0002",
                "JPG",
                fake_jpeg(2048, 2),
                Some(at(2024, 6, 30, 23, 59, 10)),
            ),
            MockItem::photo(
                "o3",
                "DSCF0003",
                "RAF",
                fake_jpeg(8192, 3),
                Some(at(2024, 7, 2, 7, 0, 0)),
            ),
            MockItem::photo("o4", "DSCF0004", "JPG", fake_jpeg(1024, 4), None),
            MockItem::photo("o5", "DSCF0005", "JPG", fake_jpeg(1024, 5), None).set(
                keys::ITEM_TIME_STAMP,
                PropertyValue::Text("2024:07:04 18:30:00".to_string()),
            ),
            MockItem::with_properties(
                "o6",
                PropertyBag::new()
                    .with(keys::ITEM_NAME, PropertyValue::Text("THUMBS".to_string()))
                    .with(
                        keys::FILENAME_EXTENSION,
                        PropertyValue::Text("DB".to_string()),
                    )
                    .with(keys::ITEM_SIZE, PropertyValue::Integer(0)),
                Some(Vec::new()),
            ),
        ]);

    MockCatalog::new()
        .with_device(camera)
        .with_device(MockDevice::named("Generic Printer"))
        .with_device(MockDevice::unnamed())
}
