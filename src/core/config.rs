//! Configuration module for the camera ingest tool
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\camera_ingest\config.toml
//! - Linux/macOS: ~/.config/camera_ingest/config.toml

use crate::core::ingest::IngestConfig;
use crate::core::planner::CollisionPolicy;
use crate::core::reconcile::{validate_offset_minutes, DEFAULT_OFFSET_MINUTES};
use crate::device::classifier::DEFAULT_NAME_FRAGMENTS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for config directory
const APP_NAME: &str = "camera_ingest";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Folder created under the user's Pictures directory by default
const DEFAULT_IMPORT_FOLDER: &str = "Camera Import";

/// Local config files checked before the standard location
const LOCAL_CONFIG_PATHS: [&str; 2] = ["./camera_ingest.toml", "./config.toml"];

/// Get the standard configuration directory for the application.
///
/// Returns:
/// - Windows: %APPDATA%\camera_ingest
/// - Linux/macOS: ~/.config/camera_ingest
pub fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join(APP_NAME))
    }

    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir().map(|home| home.join(".config").join(APP_NAME))
    }
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Ensure the configuration directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    Ok(config_dir)
}

/// Initialize the configuration file if it doesn't exist.
///
/// With `reset` the file is rewritten from the default template.
/// Returns the path to the config file.
pub fn init_config(reset: bool) -> Result<PathBuf, ConfigError> {
    let config_dir = ensure_config_dir()?;
    let config_path = config_dir.join(CONFIG_FILE_NAME);

    if reset || !config_path.exists() {
        fs::write(&config_path, Config::generate_default_config())
            .map_err(|e| ConfigError::WriteError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// Open the configuration file in the default application.
pub fn open_config_in_editor() -> Result<PathBuf, ConfigError> {
    let config_path = init_config(false)?;

    open::that(&config_path)
        .map_err(|e| ConfigError::OpenError(config_path.clone(), e.to_string()))?;

    Ok(config_path)
}

/// The user's Pictures folder, falling back to the home directory
pub fn default_destination_root() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_IMPORT_FOLDER)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output settings
    pub output: OutputConfig,

    /// Device detection settings
    pub devices: DevicesConfig,

    /// Timestamp handling
    pub timestamps: TimestampConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Run report settings
    pub report: ReportConfig,
}

/// Output directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the year/month tree (empty = `<Pictures>/Camera Import`)
    pub directory: PathBuf,

    /// What to do when a file with the same name exists
    pub collision_policy: CollisionPolicy,
}

/// Device detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Case-sensitive name fragments that mark a device as a camera
    pub name_fragments: Vec<String>,
}

/// Timestamp configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    /// Minutes subtracted from device time before applying it to files
    pub offset_minutes: i64,

    /// Parse textual timestamps instead of filing them under Unknown_Date
    pub parse_text: bool,

    /// Rewrite file times after copying
    pub reconcile: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

/// Run report configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Write a JSON run report here after each ingestion
    pub json_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(), // Empty = Pictures/Camera Import
            collision_policy: CollisionPolicy::Overwrite,
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            name_fragments: DEFAULT_NAME_FRAGMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            offset_minutes: DEFAULT_OFFSET_MINUTES,
            parse_text: false,
            reconcile: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./camera_ingest.log"),
        }
    }
}

impl Config {
    /// The destination root, resolving an empty directory to the default
    pub fn effective_destination_root(&self) -> PathBuf {
        if self.output.directory.as_os_str().is_empty() {
            default_destination_root()
        } else {
            self.output.directory.clone()
        }
    }

    /// Build the ingestion settings described by this configuration
    pub fn to_ingest_config(&self) -> IngestConfig {
        IngestConfig::new(self.effective_destination_root())
            .collision(self.output.collision_policy)
            .name_fragments(self.devices.name_fragments.clone())
            .local_offset_minutes(self.timestamps.offset_minutes)
            .parse_text_timestamps(self.timestamps.parse_text)
            .reconcile(self.timestamps.reconcile)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_offset_minutes(self.timestamps.offset_minutes)
            .map_err(|e| ConfigError::InvalidValue("timestamps.offset_minutes", e))?;
        Ok(())
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./camera_ingest.toml
    /// 2. ./config.toml
    /// 3. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        Self::find_config_file()
            .or_else(get_config_path)
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    fn find_config_file() -> Option<PathBuf> {
        LOCAL_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .chain(get_config_path())
            .find(|path| path.exists())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// A setting has a value that cannot be used
    InvalidValue(&'static str, String),
    /// Failed to serialize configuration to TOML
    SerializeError(String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
    /// Failed to open config file in editor
    OpenError(PathBuf, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ParseError(path, err) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::InvalidValue(key, err) => write!(f, "Invalid {}: {}", key, err),
            ConfigError::SerializeError(err) => {
                write!(f, "Failed to serialize configuration: {}", err)
            }
            ConfigError::WriteError(path, err) => {
                write!(
                    f,
                    "Failed to write config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
            ConfigError::OpenError(path, err) => {
                write!(
                    f,
                    "Failed to open config file '{}': {}",
                    path.display(),
                    err
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timestamps.offset_minutes, 120);
        assert!(!config.timestamps.parse_text);
        assert!(config.timestamps.reconcile);
        assert_eq!(config.output.collision_policy, CollisionPolicy::Overwrite);
        assert_eq!(config.devices.name_fragments, vec!["Camera", "X-T30"]);
        assert!(config.report.json_file.is_none());
    }

    #[test]
    fn test_example_config_parses_to_defaults() {
        let config: Config = toml::from_str(&Config::generate_default_config()).unwrap();
        let defaults = Config::default();

        assert_eq!(config.output.directory, defaults.output.directory);
        assert_eq!(config.output.collision_policy, defaults.output.collision_policy);
        assert_eq!(config.devices.name_fragments, defaults.devices.name_fragments);
        assert_eq!(
            config.timestamps.offset_minutes,
            defaults.timestamps.offset_minutes
        );
        assert_eq!(config.logging.level, defaults.logging.level);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [output]
            collision_policy = "rename"

            [timestamps]
            offset_minutes = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.output.collision_policy, CollisionPolicy::Rename);
        assert_eq!(config.timestamps.offset_minutes, 60);
        assert!(config.timestamps.reconcile);
        assert_eq!(config.devices.name_fragments.len(), 2);
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");
        assert!(matches!(
            Config::load(&missing),
            Err(ConfigError::FileNotFound(_))
        ));

        let bad = temp.path().join("bad.toml");
        fs::write(&bad, "[output\ndirectory = ").unwrap();
        assert!(matches!(Config::load(&bad), Err(ConfigError::ParseError(..))));
    }

    #[test]
    fn test_rendered_toml_loads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.output.directory = temp.path().join("photos");
        config.devices.name_fragments = vec!["EOS".to_string()];
        config.report.json_file = Some(temp.path().join("report.json"));
        fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.output.directory, temp.path().join("photos"));
        assert_eq!(loaded.devices.name_fragments, vec!["EOS"]);
        assert_eq!(loaded.report.json_file, Some(temp.path().join("report.json")));
    }

    #[test]
    fn test_out_of_range_offset_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[timestamps]\noffset_minutes = 200000000000\n").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::InvalidValue("timestamps.offset_minutes", _))
        ));

        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.timestamps.offset_minutes = i64::MIN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_destination_root() {
        let mut config = Config::default();
        assert!(config
            .effective_destination_root()
            .ends_with(DEFAULT_IMPORT_FOLDER));

        config.output.directory = PathBuf::from("/mnt/photos");
        assert_eq!(
            config.effective_destination_root(),
            PathBuf::from("/mnt/photos")
        );
    }

    #[test]
    fn test_to_ingest_config() {
        let mut config = Config::default();
        config.output.directory = PathBuf::from("/mnt/photos");
        config.timestamps.offset_minutes = -60;
        config.timestamps.parse_text = true;

        let ingest = config.to_ingest_config();
        assert_eq!(ingest.destination_root, PathBuf::from("/mnt/photos"));
        assert_eq!(ingest.local_offset_minutes, -60);
        assert!(ingest.parse_text_timestamps);
        assert!(ingest.reconcile);
    }
}
