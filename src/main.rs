//! Camera Ingest - CLI Entry Point
//!
//! Thin wrapper around the library: argument parsing, configuration
//! overrides, logging setup, Ctrl+C handling, and command dispatch.

use anyhow::{Context, Result};
use camera_ingest::cli::{self, Args, DualWriter};
use camera_ingest::core::config::Config;
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::fs::OpenOptions;
use std::io::Write;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // An explicit --config must load; the default search falls back quietly
    let mut config = match args.config {
        Some(ref config_path) => Config::load(config_path)?,
        None => Config::load_default().unwrap_or_else(|e| {
            eprintln!("Warning: {}. Using default settings.", e);
            Config::default()
        }),
    };

    // Apply CLI overrides to config
    if let Some(ref output) = args.output {
        config.output.directory = output.clone();
    }
    if let Some(minutes) = args.offset_minutes {
        config.timestamps.offset_minutes = minutes;
    }
    if let Some(collision) = args.collision {
        config.output.collision_policy = collision.into();
    }
    if args.parse_text_timestamps {
        config.timestamps.parse_text = true;
    }
    if args.no_reconcile {
        config.timestamps.reconcile = false;
    }
    if let Some(ref report) = args.report {
        config.report.json_file = Some(report.clone());
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }

    // Set up graceful shutdown handler
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();

    ctrlc::set_handler(move || {
        if shutdown_flag_clone.load(Ordering::SeqCst) {
            eprintln!("\nForce shutdown requested. Exiting immediately...");
            std::process::exit(1);
        } else {
            shutdown_flag_clone.store(true, Ordering::SeqCst);
            eprintln!("\nStopping after the current file... (Press Ctrl+C again to force quit)");
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    init_logging(&config)?;

    info!("Camera Ingest v{}", camera_ingest::VERSION);

    cli::run_command(&args, &config, shutdown_flag)
}

fn init_logging(config: &Config) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    if config.logging.log_to_file {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.logging.log_file)
            .with_context(|| {
                format!(
                    "Failed to open log file {}",
                    config.logging.log_file.display()
                )
            })?;

        Builder::new()
            .filter_level(log_level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {} {}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .target(env_logger::Target::Pipe(Box::new(DualWriter {
                console: std::io::stderr(),
                file: log_file,
            })))
            .init();

        info!("Logging to file: {}", config.logging.log_file.display());
    } else {
        Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
            .init();
    }

    Ok(())
}
