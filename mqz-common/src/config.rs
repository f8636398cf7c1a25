//! Bootstrap configuration and data folder resolution
//!
//! The TOML file only carries bootstrap concerns (where the database and the
//! packaged assets live, logging, output device, speech fallback tuning).
//! Runtime settings such as volume live in the database.
//!
//! # Data folder priority
//!
//! 1. Command-line argument
//! 2. `MQZ_DATA_FOLDER` environment variable
//! 3. `data_folder` in the TOML file
//! 4. OS-dependent default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "MQZ_DATA_FOLDER";

/// File name searched for when no explicit config path is given
pub const CONFIG_FILE_NAME: &str = "mqz-audio.toml";

/// Bootstrap configuration loaded from TOML file
///
/// Every field has a built-in default, so an empty file (or no file at all)
/// is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database and, by default, the packaged assets
    pub data_folder: Option<PathBuf>,

    /// SQLite database path (relative paths resolve against the data folder)
    pub database_path: PathBuf,

    /// Packaged asset root: a directory or an `http(s)://` base URL
    pub asset_root: String,

    /// Narration language tag used for questions
    pub language: String,

    pub logging: LoggingConfig,
    pub output: OutputConfig,
    pub speech: SpeechConfig,
    pub session: SessionConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            database_path: PathBuf::from("mqz.db"),
            asset_root: "audio".to_string(),
            language: default_language(),
            logging: LoggingConfig::default(),
            output: OutputConfig::default(),
            speech: SpeechConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Output device selection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Device name; `None` selects the host default device
    #[serde(default)]
    pub device: Option<String>,
}

/// Synthesized speech fallback tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// Speech engine executable
    #[serde(default = "default_speech_command")]
    pub command: String,

    /// Speaking rate relative to normal (1.0)
    #[serde(default = "default_speech_rate")]
    pub rate: f32,

    /// Pitch relative to normal (1.0)
    #[serde(default = "default_speech_pitch")]
    pub pitch: f32,

    /// Voice name fragments preferred over the first matching voice
    #[serde(default = "default_preferred_voices")]
    pub preferred_voices: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            command: default_speech_command(),
            rate: default_speech_rate(),
            pitch: default_speech_pitch(),
            preferred_voices: default_preferred_voices(),
        }
    }
}

/// Quiz session shape
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Number of upcoming questions kept preloaded
    #[serde(default = "default_lookahead")]
    pub lookahead: usize,

    /// Questions per session
    #[serde(default = "default_session_length")]
    pub length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lookahead: default_lookahead(),
            length: default_session_length(),
        }
    }
}

fn default_language() -> String {
    "ar-SA".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_speech_command() -> String {
    "espeak-ng".to_string()
}

fn default_speech_rate() -> f32 {
    0.9
}

fn default_speech_pitch() -> f32 {
    1.1
}

fn default_preferred_voices() -> Vec<String> {
    ["Google", "Samantha", "Laila", "Maged"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_lookahead() -> usize {
    3
}

fn default_session_length() -> usize {
    15
}

/// Where packaged static assets are fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    /// Local directory
    Directory(PathBuf),
    /// Base URL, without trailing slash
    Url(String),
}

impl TomlConfig {
    /// Parse a TOML file. Errors if the file is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration with graceful degradation.
    ///
    /// An explicit path must exist and parse. Without one, the working
    /// directory and then the platform config directory are searched; when
    /// nothing is found the built-in defaults are used.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match find_config_file() {
            Some(path) => Self::load(&path),
            None => {
                warn!("No {} found, using built-in defaults", CONFIG_FILE_NAME);
                Ok(Self::default())
            }
        }
    }

    /// Database file path resolved against the data folder
    pub fn database_path(&self, data_folder: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            data_folder.join(&self.database_path)
        }
    }

    /// Packaged asset location resolved against the data folder
    pub fn asset_location(&self, data_folder: &Path) -> Result<AssetLocation> {
        let root = self.asset_root.trim();
        if root.is_empty() {
            return Err(Error::Config("asset_root must not be empty".to_string()));
        }

        if root.starts_with("http://") || root.starts_with("https://") {
            return Ok(AssetLocation::Url(root.trim_end_matches('/').to_string()));
        }

        let path = PathBuf::from(root);
        if path.is_absolute() {
            Ok(AssetLocation::Directory(path))
        } else {
            Ok(AssetLocation::Directory(data_folder.join(path)))
        }
    }
}

/// Resolve the data folder following the documented priority order.
pub fn resolve_data_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// Create the data folder if it does not exist yet.
pub fn ensure_data_folder(path: &Path) -> Result<()> {
    if !path.exists() {
        info!("Creating data folder {}", path.display());
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|d| d.join("mqz").join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mqz"))
        .unwrap_or_else(|| PathBuf::from("./mqz_data"))
}
