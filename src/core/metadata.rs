//! Item metadata extraction
//!
//! Reads name, extension, size and capture time from an item's property bag.
//! The capture time is the subtle part: devices report it as a tagged value
//! that may carry a calendar-date facet, a textual facet, or neither. It is
//! reduced to [`CaptureTimestamp`] first and from there to an optional instant.
//! Extraction never fails; absent or malformed properties fall back to the
//! sentinels below.

use crate::core::error::{IngestError, Result};
use crate::device::traits::{keys, PropertyBag, PropertyValue};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use log::{debug, trace};
use serde::Serialize;

/// Year/month sentinel for items without a usable capture time
pub const UNKNOWN_DATE: &str = "Unknown_Date";

/// Name used when the item reports none
pub const UNNAMED_ITEM: &str = "Unnamed Item";

/// Extension used when the item reports none
pub const UNKNOWN_EXTENSION: &str = "Unknown";

/// Layouts tried when textual timestamp parsing is enabled
const TEXT_LAYOUTS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M%S",
];

/// OLE automation dates count days from this midnight
fn ole_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Valid OLE automation date range (years 100 through 9999)
const OLE_MIN_DAYS: f64 = -657_434.0;
const OLE_MAX_DAYS: f64 = 2_958_466.0;

/// The device-reported capture time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CaptureTimestamp {
    /// No timestamp property, or one exposing neither facet
    Absent,
    /// Calendar-date facet
    Concrete(NaiveDateTime),
    /// Textual facet, kept verbatim
    RawText(String),
}

impl CaptureTimestamp {
    /// Read the `Item Time Stamp` property
    pub fn from_properties(properties: &PropertyBag) -> Self {
        match properties.get(keys::ITEM_TIME_STAMP) {
            Ok(PropertyValue::Date(instant)) => CaptureTimestamp::Concrete(*instant),
            Ok(PropertyValue::Text(text)) => CaptureTimestamp::RawText(text.clone()),
            Ok(other) => {
                debug!(
                    "Timestamp property has no date or text facet ({}), ignoring",
                    other.kind()
                );
                CaptureTimestamp::Absent
            }
            Err(_) => CaptureTimestamp::Absent,
        }
    }

    /// Reduce to a concrete instant
    ///
    /// Text is only parsed when `parse_text` is set; otherwise a textual
    /// timestamp is unresolvable.
    pub fn instant(&self, parse_text: bool) -> Result<NaiveDateTime> {
        match self {
            CaptureTimestamp::Concrete(instant) => Ok(*instant),
            CaptureTimestamp::RawText(text) if parse_text => parse_text_timestamp(text)
                .ok_or_else(|| {
                    IngestError::TimestampUnresolvable(format!("unrecognised text '{}'", text))
                }),
            CaptureTimestamp::RawText(text) => Err(IngestError::TimestampUnresolvable(format!(
                "textual timestamp '{}' is not parsed",
                text
            ))),
            CaptureTimestamp::Absent => Err(IngestError::TimestampUnresolvable(
                "no timestamp reported".to_string(),
            )),
        }
    }
}

/// Parse a textual device timestamp
///
/// Accepts EXIF (`2024:06:01 09:15:00`), ISO-8601 with or without an offset,
/// and the compact PTP form (`20240601T091500`). Offsets are normalised to
/// UTC.
pub fn parse_text_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Some(with_offset.naive_utc());
    }

    TEXT_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
}

/// Convert an OLE automation date (days since 1899-12-30) to a timestamp
///
/// The fractional part is the time of day even for negative dates, so
/// `-1.25` is 1899-12-29 06:00.
pub fn ole_automation_to_datetime(days: f64) -> Option<NaiveDateTime> {
    if !days.is_finite() || !(OLE_MIN_DAYS..OLE_MAX_DAYS).contains(&days) {
        return None;
    }
    let date = ole_epoch().checked_add_signed(Duration::days(days.trunc() as i64))?;
    let millis = (days.fract().abs() * 86_400_000.0).round() as i64;
    date.checked_add_signed(Duration::milliseconds(millis))
}

/// Year/month partition plus the instant it was derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTimestamp {
    pub year: String,
    pub month: String,
    pub instant: Option<NaiveDateTime>,
}

impl ResolvedTimestamp {
    /// The sentinel partition
    pub fn unknown() -> Self {
        Self {
            year: UNKNOWN_DATE.to_string(),
            month: UNKNOWN_DATE.to_string(),
            instant: None,
        }
    }

    pub fn from_instant(instant: NaiveDateTime) -> Self {
        Self {
            year: format!("{:04}", instant.year()),
            month: format!("{:02}", instant.month()),
            instant: Some(instant),
        }
    }

    /// Resolve a capture timestamp, falling back to the sentinel partition
    pub fn resolve(timestamp: &CaptureTimestamp, parse_text: bool) -> Self {
        match timestamp.instant(parse_text) {
            Ok(instant) => Self::from_instant(instant),
            Err(e) => {
                debug!("{}; using {} partition", e, UNKNOWN_DATE);
                Self::unknown()
            }
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.instant.is_none()
    }
}

/// Metadata of one device item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemMetadata {
    pub name: String,
    pub extension: String,
    pub size: Option<i64>,
    pub timestamp: CaptureTimestamp,
}

impl ItemMetadata {
    /// Extract metadata, substituting sentinels for anything unusable
    pub fn extract(properties: &PropertyBag) -> Self {
        let name = text_or(properties, keys::ITEM_NAME, UNNAMED_ITEM);
        let extension = text_or(properties, keys::FILENAME_EXTENSION, UNKNOWN_EXTENSION);
        let size = match properties.integer(keys::ITEM_SIZE) {
            Ok(size) => Some(size),
            Err(e) => {
                trace!("{}: no usable size ({})", name, e);
                None
            }
        };
        let timestamp = CaptureTimestamp::from_properties(properties);

        Self {
            name,
            extension,
            size,
            timestamp,
        }
    }

    /// `name.extension`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }
}

fn text_or(properties: &PropertyBag, key: &str, fallback: &str) -> String {
    match properties.text(key) {
        Ok(value) if !value.trim().is_empty() => value.to_string(),
        Ok(_) => fallback.to_string(),
        Err(e) => {
            trace!("{}; using '{}'", e, fallback);
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_extract_full_item() {
        let bag = PropertyBag::new()
            .with(keys::ITEM_NAME, PropertyValue::Text("DSCF0001".into()))
            .with(keys::FILENAME_EXTENSION, PropertyValue::Text("JPG".into()))
            .with(keys::ITEM_SIZE, PropertyValue::Integer(5_000))
            .with(
                keys::ITEM_TIME_STAMP,
                PropertyValue::Date(at(2023, 11, 4, 16, 20, 0)),
            );

        let meta = ItemMetadata::extract(&bag);
        assert_eq!(meta.name, "DSCF0001");
        assert_eq!(meta.extension, "JPG");
        assert_eq!(meta.size, Some(5_000));
        assert_eq!(meta.file_name(), "DSCF0001.JPG");
        assert_eq!(
            meta.timestamp,
            CaptureTimestamp::Concrete(at(2023, 11, 4, 16, 20, 0))
        );
    }

    #[test]
    fn test_extract_empty_bag_uses_sentinels() {
        let meta = ItemMetadata::extract(&PropertyBag::new());

        assert_eq!(meta.name, UNNAMED_ITEM);
        assert_eq!(meta.extension, UNKNOWN_EXTENSION);
        assert_eq!(meta.size, None);
        assert_eq!(meta.timestamp, CaptureTimestamp::Absent);
        assert_eq!(meta.file_name(), "Unnamed Item.Unknown");
    }

    #[test]
    fn test_extract_wrongly_typed_properties() {
        let bag = PropertyBag::new()
            .with(keys::ITEM_NAME, PropertyValue::Integer(12))
            .with(keys::FILENAME_EXTENSION, PropertyValue::Text("  ".into()))
            .with(keys::ITEM_SIZE, PropertyValue::Text("large".into()))
            .with(keys::ITEM_TIME_STAMP, PropertyValue::Integer(1_700_000_000));

        let meta = ItemMetadata::extract(&bag);
        assert_eq!(meta.name, UNNAMED_ITEM);
        assert_eq!(meta.extension, UNKNOWN_EXTENSION);
        assert_eq!(meta.size, None);
        assert_eq!(meta.timestamp, CaptureTimestamp::Absent);
    }

    #[test]
    fn test_text_facet_is_retained() {
        let bag = PropertyBag::new().with(
            keys::ITEM_TIME_STAMP,
            PropertyValue::Text("2024:07:04 18:30:00".into()),
        );
        assert_eq!(
            CaptureTimestamp::from_properties(&bag),
            CaptureTimestamp::RawText("2024:07:04 18:30:00".into())
        );

        let opaque = PropertyBag::new().with(
            keys::ITEM_TIME_STAMP,
            PropertyValue::Opaque("VT_BLOB".into()),
        );
        assert_eq!(
            CaptureTimestamp::from_properties(&opaque),
            CaptureTimestamp::Absent
        );
    }

    #[test]
    fn test_resolve_partitions() {
        let concrete = CaptureTimestamp::Concrete(at(2024, 3, 9, 1, 0, 0));
        let resolved = ResolvedTimestamp::resolve(&concrete, false);
        assert_eq!(resolved.year, "2024");
        assert_eq!(resolved.month, "03");
        assert_eq!(resolved.instant, Some(at(2024, 3, 9, 1, 0, 0)));

        let absent = ResolvedTimestamp::resolve(&CaptureTimestamp::Absent, true);
        assert_eq!(absent, ResolvedTimestamp::unknown());
        assert!(absent.is_unknown());
        assert_eq!(absent.year, UNKNOWN_DATE);
        assert_eq!(absent.month, UNKNOWN_DATE);
    }

    #[test]
    fn test_raw_text_only_resolves_when_enabled() {
        let text = CaptureTimestamp::RawText("2024:07:04 18:30:00".into());

        assert!(matches!(
            text.instant(false),
            Err(IngestError::TimestampUnresolvable(_))
        ));
        assert!(ResolvedTimestamp::resolve(&text, false).is_unknown());

        let resolved = ResolvedTimestamp::resolve(&text, true);
        assert_eq!(resolved.instant, Some(at(2024, 7, 4, 18, 30, 0)));
        assert_eq!(resolved.month, "07");

        let garbage = CaptureTimestamp::RawText("yesterday".into());
        assert!(ResolvedTimestamp::resolve(&garbage, true).is_unknown());
    }

    #[test]
    fn test_parse_text_layouts() {
        let expected = at(2024, 6, 1, 9, 15, 0);
        for text in [
            "2024:06:01 09:15:00",
            "2024-06-01T09:15:00",
            "2024-06-01 09:15:00",
            "20240601T091500",
            "20240601T091500.0",
            "2024-06-01T11:15:00+02:00",
            " 2024-06-01T09:15:00Z ",
        ] {
            assert_eq!(parse_text_timestamp(text), Some(expected), "layout {}", text);
        }
        assert_eq!(parse_text_timestamp(""), None);
        assert_eq!(parse_text_timestamp("06/01/2024"), None);
    }

    #[test]
    fn test_ole_automation_dates() {
        assert_eq!(ole_automation_to_datetime(0.0), Some(at(1899, 12, 30, 0, 0, 0)));
        // 2024-06-01 is day 45444; .5 is noon
        assert_eq!(
            ole_automation_to_datetime(45444.5),
            Some(at(2024, 6, 1, 12, 0, 0))
        );
        assert_eq!(
            ole_automation_to_datetime(-1.25),
            Some(at(1899, 12, 29, 6, 0, 0))
        );
        assert_eq!(
            ole_automation_to_datetime(-0.5),
            Some(at(1899, 12, 30, 12, 0, 0))
        );
        assert_eq!(ole_automation_to_datetime(f64::NAN), None);
        assert_eq!(ole_automation_to_datetime(1e12), None);
    }
}
