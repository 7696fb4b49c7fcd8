//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use crate::core::planner::CollisionPolicy;
use crate::core::reconcile::validate_offset_minutes;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Copy photos and videos from connected cameras into a year/month folder tree
#[derive(Parser, Debug)]
#[command(name = "camera-ingest")]
#[command(author = "Vihaan Reddy M")]
#[command(version)]
#[command(
    about = "Copy photos from connected cameras into YEAR/MONTH folders, stamped with the capture time",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Destination root for imported files (overrides config)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Minutes subtracted from the device clock (overrides config)
    #[arg(
        long,
        value_name = "MINUTES",
        value_parser = parse_offset_minutes,
        allow_hyphen_values = true,
        global = true
    )]
    pub offset_minutes: Option<i64>,

    /// What to do when a destination file exists (overrides config)
    #[arg(long, value_enum, global = true)]
    pub collision: Option<CollisionArg>,

    /// Parse textual device timestamps instead of filing them under Unknown_Date
    #[arg(long, global = true)]
    pub parse_text_timestamps: bool,

    /// Leave file times as written instead of applying the capture time
    #[arg(long, global = true)]
    pub no_reconcile: bool,

    /// Write a JSON run report to this file (overrides config)
    #[arg(long, value_name = "FILE", global = true)]
    pub report: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

/// Collision policy as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionArg {
    Overwrite,
    Rename,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
            CollisionArg::Rename => CollisionPolicy::Rename,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import from every connected camera (the default)
    Ingest,

    /// List connected devices and whether they would be imported
    List,

    /// Open the configuration file in your default editor
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\camera_ingest\config.toml
    /// - Linux/macOS: ~/.config/camera_ingest/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Show the config file path without opening it
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,

    /// Run an import against a built-in simulated camera
    ///
    /// Needs no device; useful to check the folder layout and timestamps
    /// the tool produces.
    Simulate,
}

fn parse_offset_minutes(value: &str) -> Result<i64, String> {
    let minutes = value
        .parse::<i64>()
        .map_err(|e| format!("'{}' is not a whole number of minutes: {}", value, e))?;
    validate_offset_minutes(minutes)
}
