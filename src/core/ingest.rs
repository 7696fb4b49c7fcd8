//! Ingestion orchestration
//!
//! Drives the whole run: enumerate devices, classify each one, connect to the
//! eligible ones and walk their items through extract → plan → transfer →
//! reconcile. Work is strictly sequential, one device and one item at a time.
//!
//! Only a failure of the device catalog itself aborts the run. Every other
//! failure is recorded in the [`RunReport`] and the run moves on to the next
//! item or device.

use crate::core::error::{IngestError, Result};
use crate::core::metadata::{ItemMetadata, ResolvedTimestamp};
use crate::core::planner::{CollisionPolicy, PathPlanner};
use crate::core::reconcile::{StepStatus, TimestampReconciler, DEFAULT_OFFSET_MINUTES};
use crate::core::transfer::{TransferEngine, TransferOutcome};
use crate::device::classifier::{Classification, DeviceClassifier, DEFAULT_NAME_FRAGMENTS};
use crate::device::traits::{
    CaptureDeviceTrait, DeviceCatalogTrait, DeviceItem, DeviceSessionTrait,
};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit code when every attempted item was copied
pub const EXIT_SUCCESS: u8 = 0;

/// Exit code when at least one device or item failed
pub const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Settings for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Root of the year/month tree
    pub destination_root: PathBuf,
    /// Minutes subtracted from device time before it is applied to files
    pub local_offset_minutes: i64,
    /// What to do when a planned file already exists
    pub collision: CollisionPolicy,
    /// Device name fragments that mark a capture device
    pub name_fragments: Vec<String>,
    /// Parse textual timestamps instead of routing them to `Unknown_Date`
    pub parse_text_timestamps: bool,
    /// Rewrite file times after copying
    pub reconcile: bool,
    /// Draw a progress bar per device
    pub show_progress: bool,
}

impl IngestConfig {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            destination_root: destination_root.into(),
            local_offset_minutes: DEFAULT_OFFSET_MINUTES,
            collision: CollisionPolicy::default(),
            name_fragments: DEFAULT_NAME_FRAGMENTS.iter().map(|s| s.to_string()).collect(),
            parse_text_timestamps: false,
            reconcile: true,
            show_progress: false,
        }
    }

    pub fn local_offset_minutes(mut self, minutes: i64) -> Self {
        self.local_offset_minutes = minutes;
        self
    }

    pub fn collision(mut self, policy: CollisionPolicy) -> Self {
        self.collision = policy;
        self
    }

    pub fn name_fragments(mut self, fragments: Vec<String>) -> Self {
        self.name_fragments = fragments;
        self
    }

    pub fn parse_text_timestamps(mut self, enabled: bool) -> Self {
        self.parse_text_timestamps = enabled;
        self
    }

    pub fn reconcile(mut self, enabled: bool) -> Self {
        self.reconcile = enabled;
        self
    }

    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }
}

/// Report for one item
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub item_id: String,
    pub file_name: String,
    /// `year/month` partition the item was planned into
    pub partition: String,
    pub outcome: TransferOutcome,
    /// Non-fatal problems, e.g. short reads or timestamps that could not be
    /// applied
    pub warnings: Vec<String>,
}

/// What happened to a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceStatus {
    Ingested,
    Skipped { reason: String },
    Failed { reason: String },
    Interrupted,
}

/// Report for one device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub name: String,
    pub status: DeviceStatus,
    pub items: Vec<ItemReport>,
}

/// Aggregate counts over a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub devices_found: usize,
    pub devices_ingested: usize,
    pub devices_skipped: usize,
    pub devices_failed: usize,
    pub items_copied: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    pub item_warnings: usize,
    pub bytes_copied: u64,
}

impl fmt::Display for RunTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size_mb = self.bytes_copied as f64 / 1_048_576.0;
        write!(
            f,
            "Devices: {} found, {} ingested, {} skipped, {} failed. Items: {} copied, {} skipped, {} failed, {} warnings. Total size: {:.2} MB",
            self.devices_found,
            self.devices_ingested,
            self.devices_skipped,
            self.devices_failed,
            self.items_copied,
            self.items_skipped,
            self.items_failed,
            self.item_warnings,
            size_mb
        )
    }
}

/// Structured end-of-run report
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub destination_root: PathBuf,
    pub interrupted: bool,
    pub devices: Vec<DeviceReport>,
    pub totals: RunTotals,
}

impl RunReport {
    fn new(destination_root: &Path) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            destination_root: destination_root.to_path_buf(),
            interrupted: false,
            devices: Vec::new(),
            totals: RunTotals::default(),
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.totals = self.compute_totals();
        self
    }

    fn compute_totals(&self) -> RunTotals {
        let mut totals = RunTotals {
            devices_found: self.devices.len(),
            ..Default::default()
        };

        for device in &self.devices {
            match device.status {
                DeviceStatus::Ingested | DeviceStatus::Interrupted => totals.devices_ingested += 1,
                DeviceStatus::Skipped { .. } => totals.devices_skipped += 1,
                DeviceStatus::Failed { .. } => totals.devices_failed += 1,
            }
            for item in &device.items {
                match &item.outcome {
                    TransferOutcome::Copied { bytes, .. } => {
                        totals.items_copied += 1;
                        totals.bytes_copied += bytes;
                    }
                    TransferOutcome::SkippedNotTransferable { .. } => totals.items_skipped += 1,
                    TransferOutcome::Failed { .. } => totals.items_failed += 1,
                }
                totals.item_warnings += item.warnings.len();
            }
        }

        totals
    }

    pub fn totals(&self) -> &RunTotals {
        &self.totals
    }

    /// Whether any device or item failed, or the run was interrupted
    pub fn has_failures(&self) -> bool {
        self.interrupted || self.totals.devices_failed > 0 || self.totals.items_failed > 0
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> u8 {
        if self.has_failures() {
            EXIT_PARTIAL_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }

    /// All item reports across devices
    pub fn items(&self) -> impl Iterator<Item = &ItemReport> {
        self.devices.iter().flat_map(|d| d.items.iter())
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IngestError::Io(format!("Failed to serialize report: {}", e)))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json).map_err(|e| {
            IngestError::Io(format!(
                "Failed to write report '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

/// Runs the ingestion pipeline against a device catalog
pub struct Ingestor<C> {
    catalog: C,
    config: IngestConfig,
    classifier: DeviceClassifier,
    planner: PathPlanner,
    reconciler: TimestampReconciler,
}

impl<C: DeviceCatalogTrait> Ingestor<C> {
    pub fn new(catalog: C, config: IngestConfig) -> Self {
        let classifier = DeviceClassifier::new(config.name_fragments.clone());
        let planner = PathPlanner::new(config.destination_root.clone(), config.collision);
        let reconciler = TimestampReconciler::new(config.local_offset_minutes);

        Self {
            catalog,
            config,
            classifier,
            planner,
            reconciler,
        }
    }

    /// Run a full ingestion
    ///
    /// Fails only when the device catalog cannot be enumerated.
    pub fn run(&self, shutdown_flag: Arc<AtomicBool>) -> Result<RunReport> {
        let mut report = RunReport::new(&self.config.destination_root);

        let devices = self.catalog.list_devices().map_err(|e| match e {
            IngestError::DeviceEnumeration(_) => e,
            other => IngestError::DeviceEnumeration(other.to_string()),
        })?;

        if devices.is_empty() {
            info!("No portable devices found.");
            return Ok(report.finish());
        }
        debug!("Catalog reported {} device(s)", devices.len());

        for device in &devices {
            if shutdown_flag.load(Ordering::SeqCst) {
                warn!("Shutdown requested, stopping ingestion...");
                report.interrupted = true;
                break;
            }

            let device_report = match self.classifier.classify(device) {
                Classification::Eligible { name } => {
                    info!("Camera found: {}", name);
                    self.ingest_device(device, name, &shutdown_flag)
                }
                other => {
                    let name = other.display_name().to_string();
                    info!("Skipping non-camera device: {}", name);
                    let reason = match other {
                        Classification::Unnamed => "device reports no name",
                        _ => "name matches no camera fragment",
                    };
                    DeviceReport {
                        name,
                        status: DeviceStatus::Skipped {
                            reason: reason.to_string(),
                        },
                        items: Vec::new(),
                    }
                }
            };

            if device_report.status == DeviceStatus::Interrupted {
                report.interrupted = true;
            }
            report.devices.push(device_report);
        }

        info!("Done.");
        Ok(report.finish())
    }

    fn ingest_device(
        &self,
        device: &C::Device,
        name: String,
        shutdown_flag: &AtomicBool,
    ) -> DeviceReport {
        let failed = |name: String, e: IngestError| {
            warn!("Failed to read from '{}': {}", name, e);
            DeviceReport {
                name,
                status: DeviceStatus::Failed {
                    reason: e.to_string(),
                },
                items: Vec::new(),
            }
        };

        let session = match device.connect() {
            Ok(session) => session,
            Err(e) => return failed(name, e),
        };

        let items = match session.items() {
            Ok(items) => items,
            Err(e) => return failed(name, e),
        };

        info!(
            "Listing and copying {} item(s) from device: {}",
            items.len(),
            name
        );

        let progress = self.progress_bar(items.len());
        let mut reports = Vec::with_capacity(items.len());
        let mut status = DeviceStatus::Ingested;

        for (index, item) in items.iter().enumerate() {
            if shutdown_flag.load(Ordering::SeqCst) {
                warn!("Shutdown requested, stopping after {} item(s)", index);
                status = DeviceStatus::Interrupted;
                break;
            }

            progress.set_position(index as u64);
            let item_report = self.ingest_item(&session, item);
            progress.set_message(item_report.file_name.chars().take(30).collect::<String>());
            progress.suspend(|| log_item(&item_report));
            reports.push(item_report);
        }

        progress.finish_and_clear();

        DeviceReport {
            name,
            status,
            items: reports,
        }
    }

    /// Extract → plan → transfer → reconcile for one item
    fn ingest_item<S: DeviceSessionTrait>(&self, session: &S, item: &DeviceItem) -> ItemReport {
        let metadata = ItemMetadata::extract(&item.properties);
        let resolved =
            ResolvedTimestamp::resolve(&metadata.timestamp, self.config.parse_text_timestamps);
        debug!(
            "{}: year {}, month {}",
            metadata.file_name(),
            resolved.year,
            resolved.month
        );

        let plan = self.planner.plan(&resolved, &metadata);
        let mut warnings = Vec::new();

        let outcome = match TransferEngine::new(&self.planner).transfer(
            session,
            &item.item_id,
            &metadata,
            plan,
        ) {
            Ok(TransferOutcome::Copied { path, bytes, .. }) => {
                if let Some(reported) = metadata.size.filter(|&size| size as u64 != bytes) {
                    warnings.push(format!(
                        "{}: device reported {} bytes, received {}",
                        metadata.file_name(),
                        reported,
                        bytes
                    ));
                }
                let applied_timestamp = match resolved.instant {
                    Some(instant) if self.config.reconcile => {
                        let reconciliation = self.reconciler.apply(&path, instant);
                        warnings.extend(
                            reconciliation
                                .failures(&path)
                                .into_iter()
                                .map(|e| e.to_string()),
                        );
                        reconciliation
                            .applied
                            .filter(|_| reconciliation.modified == StepStatus::Applied)
                    }
                    _ => None,
                };
                TransferOutcome::Copied {
                    path,
                    bytes,
                    applied_timestamp,
                }
            }
            Ok(other) => other,
            Err(e) => TransferOutcome::Failed {
                reason: e.to_string(),
            },
        };

        ItemReport {
            item_id: item.item_id.clone(),
            file_name: metadata.file_name(),
            partition: format!("{}/{}", resolved.year, resolved.month),
            outcome,
            warnings,
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress
    }
}

fn log_item(report: &ItemReport) {
    match &report.outcome {
        TransferOutcome::Copied { path, .. } => info!("Copied: {}", path.display()),
        TransferOutcome::SkippedNotTransferable { reason } => {
            info!("Skipping {}: not transferable ({})", report.file_name, reason)
        }
        TransferOutcome::Failed { reason } => {
            warn!("Failed to copy {}: {}", report.file_name, reason)
        }
    }
    for warning in &report.warnings {
        warn!("{}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::UNKNOWN_DATE;
    use crate::device::traits::{keys, PropertyValue};
    use crate::testdb::{fake_jpeg, MockCatalog, MockDevice, MockDeviceConfig, MockItem};
    use chrono::{NaiveDate, NaiveDateTime};
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn no_shutdown() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    fn camera_with(items: Vec<MockItem>) -> MockCatalog {
        MockCatalog::new().with_device(MockDevice::named("Canon Camera").with_items(items))
    }

    #[test]
    fn test_enumeration_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let ingestor = Ingestor::new(MockCatalog::unavailable(), IngestConfig::new(temp.path()));

        let result = ingestor.run(no_shutdown());
        assert!(matches!(result, Err(IngestError::DeviceEnumeration(_))));
    }

    #[test]
    fn test_no_devices_completes() {
        let temp = TempDir::new().unwrap();
        let report = Ingestor::new(MockCatalog::new(), IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();

        assert!(report.devices.is_empty());
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_dated_item_is_partitioned_and_reconciled() {
        let temp = TempDir::new().unwrap();
        let taken = at(2024, 6, 1, 9, 15, 0);
        let catalog = camera_with(vec![MockItem::photo(
            "o1",
            "DSCF0001",
            "JPG",
            fake_jpeg(512, 1),
            Some(taken),
        )]);

        let report = Ingestor::new(catalog, IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();

        let expected = temp.path().join("2024").join("06").join("DSCF0001.JPG");
        let item = report.items().next().unwrap();
        assert_eq!(item.partition, "2024/06");
        assert_eq!(
            item.outcome,
            TransferOutcome::Copied {
                path: expected.clone(),
                bytes: 512,
                applied_timestamp: Some(at(2024, 6, 1, 7, 15, 0)),
            }
        );
        assert_eq!(fs::read(&expected).unwrap(), fake_jpeg(512, 1));

        let modified = fs::metadata(&expected).unwrap().modified().unwrap();
        let wanted = SystemTime::from(at(2024, 6, 1, 7, 15, 0).and_utc());
        let delta = modified
            .duration_since(wanted)
            .unwrap_or_else(|e| e.duration());
        assert!(delta.as_secs() <= 1);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_undated_item_goes_to_unknown_date_without_reconcile() {
        let temp = TempDir::new().unwrap();
        let catalog = camera_with(vec![
            MockItem::photo("o1", "NODATE", "JPG", vec![1; 8], None),
            MockItem::photo("o2", "TEXTDATE", "JPG", vec![2; 8], None).set(
                keys::ITEM_TIME_STAMP,
                PropertyValue::Text("2024:07:04 18:30:00".into()),
            ),
        ]);

        let report = Ingestor::new(catalog, IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();

        let unknown = temp.path().join(UNKNOWN_DATE).join(UNKNOWN_DATE);
        for item in report.items() {
            assert_eq!(item.partition, "Unknown_Date/Unknown_Date");
            match &item.outcome {
                TransferOutcome::Copied {
                    path,
                    applied_timestamp,
                    ..
                } => {
                    assert_eq!(path.parent().unwrap(), unknown);
                    assert_eq!(*applied_timestamp, None);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[test]
    fn test_text_timestamp_parsed_when_enabled() {
        let temp = TempDir::new().unwrap();
        let catalog = camera_with(vec![MockItem::photo("o1", "TEXTDATE", "JPG", vec![2; 8], None)
            .set(
                keys::ITEM_TIME_STAMP,
                PropertyValue::Text("2024:07:04 18:30:00".into()),
            )]);

        let config = IngestConfig::new(temp.path()).parse_text_timestamps(true);
        let report = Ingestor::new(catalog, config).run(no_shutdown()).unwrap();

        assert_eq!(report.items().next().unwrap().partition, "2024/07");
        assert!(temp.path().join("2024/07/TEXTDATE.JPG").exists());
    }

    #[test]
    fn test_non_transferable_items_are_skipped() {
        let temp = TempDir::new().unwrap();
        let catalog = camera_with(vec![
            MockItem::photo("o1", "EMPTY", "JPG", Vec::new(), Some(at(2024, 1, 5, 0, 0, 0))),
            MockItem::photo("o2", "NOSIZE", "JPG", vec![1; 4], Some(at(2024, 1, 5, 0, 0, 0)))
                .set(keys::ITEM_SIZE, PropertyValue::Opaque("VT_EMPTY".into())),
        ]);

        let report = Ingestor::new(catalog, IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();

        assert_eq!(report.totals().items_skipped, 2);
        assert!(report.items().all(|i| i.outcome.is_skipped()));
        assert!(!temp.path().join("2024/01/EMPTY.JPG").exists());
        assert!(!temp.path().join("2024/01/NOSIZE.JPG").exists());
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_batch_continues_after_item_failure() {
        let temp = TempDir::new().unwrap();
        let items: Vec<MockItem> = (1..=5)
            .map(|i| {
                MockItem::photo(
                    &format!("o{}", i),
                    &format!("IMG_{:04}", i),
                    "JPG",
                    fake_jpeg(64, i as u8),
                    Some(at(2023, 5, i, 12, 0, 0)),
                )
            })
            .collect();
        let device = MockDevice::named("Canon Camera")
            .with_items(items)
            .with_config(MockDeviceConfig::default().with_read_errors(vec!["o3".to_string()]));

        let report = Ingestor::new(MockCatalog::new().with_device(device), IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();

        let outcomes: Vec<&TransferOutcome> = report.items().map(|i| &i.outcome).collect();
        assert_eq!(outcomes.len(), 5);
        for (index, outcome) in outcomes.iter().enumerate() {
            if index == 2 {
                assert!(outcome.is_failed());
            } else {
                assert!(outcome.is_copied(), "item {} should be copied", index + 1);
            }
        }
        assert_eq!(report.devices[0].status, DeviceStatus::Ingested);
        assert_eq!(report.totals().items_failed, 1);
        assert_eq!(report.exit_code(), EXIT_PARTIAL_FAILURE);
    }

    #[test]
    fn test_item_listing_failure_fails_device() {
        let temp = TempDir::new().unwrap();
        let catalog = MockCatalog::new()
            .with_device(
                MockDevice::named("Canon Camera")
                    .with_items(vec![MockItem::photo("o1", "A", "JPG", vec![1; 4], None)])
                    .with_config(MockDeviceConfig::listing_fails()),
            )
            .with_device(MockDevice::named("X-T30").with_items(vec![MockItem::photo(
                "o1",
                "B",
                "JPG",
                vec![2; 4],
                None,
            )]));

        let report = Ingestor::new(catalog, IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();

        assert!(matches!(report.devices[0].status, DeviceStatus::Failed { .. }));
        assert!(report.devices[0].items.is_empty());
        assert_eq!(report.devices[1].status, DeviceStatus::Ingested);
        assert_eq!(report.totals().items_copied, 1);
        assert_eq!(report.exit_code(), EXIT_PARTIAL_FAILURE);
    }

    #[test]
    fn test_short_read_is_copied_with_warning() {
        let temp = TempDir::new().unwrap();
        let catalog = camera_with(vec![MockItem::photo("o1", "SHORT", "JPG", vec![1; 4], None)
            .set(keys::ITEM_SIZE, PropertyValue::Integer(10))]);

        let report = Ingestor::new(catalog, IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();

        let item = report.items().next().unwrap();
        assert!(item.outcome.is_copied());
        assert_eq!(item.warnings.len(), 1);
        assert!(item.warnings[0].contains("reported 10 bytes, received 4"));
        assert_eq!(report.totals().item_warnings, 1);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_out_of_range_offset_keeps_batch_going() {
        let temp = TempDir::new().unwrap();
        let catalog = camera_with(vec![
            MockItem::photo("o1", "A", "JPG", vec![1; 4], Some(at(2024, 6, 1, 9, 0, 0))),
            MockItem::photo("o2", "B", "JPG", vec![2; 4], Some(at(2024, 6, 2, 9, 0, 0))),
        ]);

        let config = IngestConfig::new(temp.path()).local_offset_minutes(200_000_000_000);
        let report = Ingestor::new(catalog, config).run(no_shutdown()).unwrap();

        assert_eq!(report.totals().items_copied, 2);
        for item in report.items() {
            assert!(matches!(
                item.outcome,
                TransferOutcome::Copied {
                    applied_timestamp: None,
                    ..
                }
            ));
            assert!(!item.warnings.is_empty());
        }
        assert!(temp.path().join("2024/06/B.JPG").exists());
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_device_classification_and_connection_failures() {
        let temp = TempDir::new().unwrap();
        let catalog = MockCatalog::new()
            .with_device(MockDevice::named("Generic Printer"))
            .with_device(MockDevice::unnamed())
            .with_device(MockDevice::named("X-T30").with_config(MockDeviceConfig::locked()));

        let report = Ingestor::new(catalog, IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();

        assert!(matches!(report.devices[0].status, DeviceStatus::Skipped { .. }));
        assert!(matches!(report.devices[1].status, DeviceStatus::Skipped { .. }));
        assert_eq!(report.devices[1].name, "(unnamed device)");
        assert!(matches!(report.devices[2].status, DeviceStatus::Failed { .. }));
        assert_eq!(report.totals().devices_skipped, 2);
        assert_eq!(report.totals().devices_failed, 1);
        assert_eq!(report.exit_code(), EXIT_PARTIAL_FAILURE);
    }

    #[test]
    fn test_rerun_produces_same_paths_and_overwrites() {
        let temp = TempDir::new().unwrap();
        let items = vec![
            MockItem::photo("o1", "A", "JPG", vec![1; 10], Some(at(2022, 3, 1, 0, 0, 0))),
            MockItem::photo("o2", "B", "JPG", vec![2; 10], Some(at(2022, 3, 2, 0, 0, 0))),
        ];

        let paths = |report: &RunReport| -> Vec<PathBuf> {
            report
                .items()
                .filter_map(|i| match &i.outcome {
                    TransferOutcome::Copied { path, .. } => Some(path.clone()),
                    _ => None,
                })
                .collect()
        };

        let first = Ingestor::new(camera_with(items.clone()), IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();
        let second = Ingestor::new(camera_with(items), IngestConfig::new(temp.path()))
            .run(no_shutdown())
            .unwrap();

        assert_eq!(paths(&first), paths(&second));
        let files: Vec<_> = fs::read_dir(temp.path().join("2022").join("03"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 2);
        assert_eq!(second.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_rename_policy_keeps_both() {
        let temp = TempDir::new().unwrap();
        let items = vec![
            MockItem::photo("o1", "SAME", "JPG", vec![1; 4], None),
            MockItem::photo("o2", "SAME", "JPG", vec![2; 4], None),
        ];

        let config = IngestConfig::new(temp.path()).collision(CollisionPolicy::Rename);
        Ingestor::new(camera_with(items), config)
            .run(no_shutdown())
            .unwrap();

        let dir = temp.path().join(UNKNOWN_DATE).join(UNKNOWN_DATE);
        assert_eq!(fs::read(dir.join("SAME.JPG")).unwrap(), vec![1; 4]);
        assert_eq!(fs::read(dir.join("SAME_1.JPG")).unwrap(), vec![2; 4]);
    }

    #[test]
    fn test_reconcile_can_be_disabled() {
        let temp = TempDir::new().unwrap();
        let catalog = camera_with(vec![MockItem::photo(
            "o1",
            "A",
            "JPG",
            vec![1; 4],
            Some(at(2001, 1, 1, 0, 0, 0)),
        )]);

        let config = IngestConfig::new(temp.path()).reconcile(false);
        let report = Ingestor::new(catalog, config).run(no_shutdown()).unwrap();

        let item = report.items().next().unwrap();
        match &item.outcome {
            TransferOutcome::Copied {
                applied_timestamp, ..
            } => assert_eq!(*applied_timestamp, None),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_flag_stops_run() {
        let temp = TempDir::new().unwrap();
        let catalog = camera_with(vec![MockItem::photo("o1", "A", "JPG", vec![1; 4], None)]);

        let report = Ingestor::new(catalog, IngestConfig::new(temp.path()))
            .run(Arc::new(AtomicBool::new(true)))
            .unwrap();

        assert!(report.interrupted);
        assert!(report.devices.is_empty());
        assert_eq!(report.exit_code(), EXIT_PARTIAL_FAILURE);
    }

    #[test]
    fn test_report_json() {
        let temp = TempDir::new().unwrap();
        let catalog = camera_with(vec![MockItem::photo(
            "o1",
            "A",
            "JPG",
            vec![1; 4],
            Some(at(2020, 2, 2, 2, 2, 2)),
        )]);
        let report = Ingestor::new(catalog, IngestConfig::new(temp.path().join("out")))
            .run(no_shutdown())
            .unwrap();

        let path = temp.path().join("reports").join("run.json");
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["totals"]["items_copied"], 1);
        assert_eq!(value["devices"][0]["status"]["status"], "ingested");
        assert_eq!(
            value["devices"][0]["items"][0]["outcome"]["status"],
            "copied"
        );
    }
}
