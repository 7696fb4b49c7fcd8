//! Core functionality module
//!
//! The ingestion pipeline and its supporting pieces.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `metadata` - Item metadata extraction and timestamp resolution
//! - `planner` - Year/month destination path planning
//! - `transfer` - Copying item content to local storage
//! - `reconcile` - Applying corrected capture times to copied files
//! - `ingest` - Orchestration and the run report

pub mod config;
pub mod error;
pub mod ingest;
pub mod metadata;
pub mod planner;
pub mod reconcile;
pub mod transfer;
