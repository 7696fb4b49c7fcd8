//! Camera Ingest Library
//!
//! Copies media from connected cameras into a `YEAR/MONTH` folder tree and
//! stamps each copied file with the device capture time, corrected by a
//! fixed local offset.
//!
//! # Architecture
//!
//! - [`device`] - The device contract, camera classification, and the
//!   Windows Portable Devices backend
//! - [`core`] - Metadata extraction, path planning, transfer, timestamp
//!   reconciliation, orchestration, configuration, and errors
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - Mock devices for running the pipeline without hardware
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use camera_ingest::core::config::Config;
//! use camera_ingest::core::ingest::Ingestor;
//! use camera_ingest::device;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let catalog = device::platform_catalog()?;
//!
//!     let shutdown_flag = Arc::new(AtomicBool::new(false));
//!     let report = Ingestor::new(catalog, config.to_ingest_config()).run(shutdown_flag)?;
//!
//!     println!("{}", report.totals());
//!     std::process::exit(report.exit_code().into());
//! }
//! ```
//!
//! # Platform Support
//!
//! Device access uses the Windows Portable Devices API. On other platforms
//! the library builds and the pipeline runs against [`testdb`] devices, but
//! the platform catalog reports enumeration failure.

pub mod cli;
pub mod core;
pub mod device;
pub mod testdb;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
