//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{print_header, print_info, print_run_summary, print_success};
use crate::cli::{Args, Commands};
use crate::core::config::{get_config_path, init_config, open_config_in_editor, Config};
use crate::core::ingest::Ingestor;
use crate::device::traits::{keys, CaptureDeviceTrait, DeviceCatalogTrait};
use crate::device::{self, DeviceClassifier};
use crate::testdb;
use anyhow::{Context, Result};
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Dispatch the parsed command
///
/// Returns the process exit code for commands that run an import; other
/// commands succeed with `ExitCode::SUCCESS` or fail with an error.
pub fn run_command(
    args: &Args,
    config: &Config,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<ExitCode> {
    let show_progress = !args.no_progress;

    match &args.command {
        None | Some(Commands::Ingest) => {
            let catalog = device::platform_catalog()
                .context("Failed to initialize the portable device service")?;
            run_ingest(catalog, config, show_progress, shutdown_flag).map(ExitCode::from)
        }
        Some(Commands::Simulate) => {
            print_info("Using a simulated FUJIFILM X-T30 with 6 items");
            run_ingest(
                testdb::sample_camera_catalog(),
                config,
                show_progress,
                shutdown_flag,
            )
            .map(ExitCode::from)
        }
        Some(Commands::List) => {
            let catalog = device::platform_catalog()
                .context("Failed to initialize the portable device service")?;
            list_devices(&catalog, config)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Config { path, reset }) => {
            handle_config_command(*path, *reset)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::GenerateConfig { file }) => {
            generate_config_file(file.clone())?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::ShowConfig) => {
            show_config(config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run an import against a catalog, returning the exit code
pub fn run_ingest<C: DeviceCatalogTrait>(
    catalog: C,
    config: &Config,
    show_progress: bool,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<u8> {
    let ingest_config = config.to_ingest_config().show_progress(show_progress);
    info!(
        "Importing to: {}",
        ingest_config.destination_root.display()
    );

    let report = Ingestor::new(catalog, ingest_config)
        .run(shutdown_flag)
        .context("Could not enumerate devices")?;

    print_run_summary(&report);
    info!("{}", report.totals());

    if let Some(path) = &config.report.json_file {
        match report.write_json(path) {
            Ok(()) => info!("Run report written to {}", path.display()),
            Err(e) => error!("{}", e),
        }
    }

    Ok(report.exit_code())
}

/// List devices with their classification
pub fn list_devices<C: DeviceCatalogTrait>(catalog: &C, config: &Config) -> Result<()> {
    info!("Scanning for connected devices...");

    let devices = catalog
        .list_devices()
        .context("Could not enumerate devices")?;

    if devices.is_empty() {
        info!("No portable devices found.");
        info!("Make sure the camera is switched on, connected by USB, and set to PC/MTP mode.");
        return Ok(());
    }

    let classifier = DeviceClassifier::new(config.devices.name_fragments.clone());

    print_header(&format!("{} device(s)", devices.len()));
    for (i, device) in devices.iter().enumerate() {
        let classification = classifier.classify(device);
        let marker = if classification.is_eligible() {
            "camera"
        } else {
            "ignored"
        };
        println!("[{}] {} ({})", i + 1, classification.display_name(), marker);
        for (label, key) in [
            ("Manufacturer", keys::MANUFACTURER),
            ("Description", keys::DESCRIPTION),
        ] {
            if let Ok(value) = device.property_value(key) {
                println!("    {}: {}", label, value);
            }
        }
    }
    println!();
    print_info(&format!(
        "Devices whose name contains any of {:?} are imported",
        classifier.fragments()
    ));

    Ok(())
}

/// Handle the config command (open, show path, or reset)
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        let path = init_config(true)?;
        print_success(&format!("Reset config file at: {}", path.display()));
        return Ok(());
    }

    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if !path.exists() {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    info!("Opening configuration file in default editor...");
    match open_config_in_editor() {
        Ok(path) => {
            info!("Config file: {}", path.display());
            info!("Run 'camera-ingest show-config' to verify your settings.");
        }
        Err(e) => {
            error!("Failed to open config file: {}", e);
            if let Some(path) = get_config_path() {
                info!("You can manually edit the config at: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(file: Option<PathBuf>) -> Result<()> {
    let path = match file {
        Some(path) => {
            if path.exists() {
                warn!("Overwriting existing file: {}", path.display());
            }
            fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path
        }
        None => init_config(false)?,
    };

    print_success(&format!("Configuration file: {}", path.display()));
    Ok(())
}

/// Show the effective configuration
pub fn show_config(config: &Config) -> Result<()> {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }

    println!("{}", config.to_toml()?);
    println!(
        "# effective destination root: {}",
        config.effective_destination_root().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ingest::EXIT_SUCCESS;
    use crate::testdb::{MockCatalog, MockDevice};
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;

    fn config_for(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.output.directory = root.to_path_buf();
        config
    }

    #[test]
    fn test_simulated_ingest_exit_code() {
        let temp = TempDir::new().unwrap();
        let mut config = config_for(&temp.path().join("import"));
        config.report.json_file = Some(temp.path().join("report.json"));

        let code = run_ingest(
            testdb::sample_camera_catalog(),
            &config,
            false,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        assert_eq!(code, EXIT_SUCCESS);
        assert!(temp.path().join("import").join("2024").join("06").is_dir());
        assert!(temp.path().join("report.json").exists());
    }

    #[test]
    fn test_enumeration_failure_is_error() {
        let temp = TempDir::new().unwrap();
        let result = run_ingest(
            MockCatalog::unavailable(),
            &config_for(temp.path()),
            false,
            Arc::new(AtomicBool::new(false)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_list_devices() {
        let catalog = MockCatalog::new()
            .with_device(MockDevice::named("Canon Camera"))
            .with_device(MockDevice::unnamed());
        assert!(list_devices(&catalog, &Config::default()).is_ok());
        assert!(list_devices(&MockCatalog::unavailable(), &Config::default()).is_err());
    }

    #[test]
    fn test_generate_config_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");

        generate_config_file(Some(path.clone())).unwrap();

        assert!(Config::load(&path).is_ok());
    }
}
