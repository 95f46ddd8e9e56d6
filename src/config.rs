use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Process-wide configuration, installed at most once
static CONFIG: OnceCell<Config> = OnceCell::new();

/// File names searched by [`Config::discover`]
const CONFIG_FILES: [&str; 2] = ["donut.toml", ".donut.toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub objects: ObjectConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Allocate the control block and the object together
    #[serde(default = "default_true")]
    pub pack_control_block: bool,

    #[serde(default = "default_debug_build")]
    pub track_alive_objects: bool,

    #[serde(default = "default_debug_build")]
    pub record_debug_info: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormatSetting,

    /// Log to daily files in this directory instead of stderr
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_false")]
    pub span_events: bool,

    /// Extra filter directives, e.g. `"donut_object::object=trace"`
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            pack_control_block: true,
            track_alive_objects: cfg!(debug_assertions),
            record_debug_info: cfg!(debug_assertions),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormatSetting::Pretty,
            directory: None,
            prefix: default_prefix(),
            span_events: false,
            filter: None,
        }
    }
}

fn default_true() -> bool { true }
fn default_false() -> bool { false }
fn default_debug_build() -> bool { cfg!(debug_assertions) }
fn default_level() -> String { "info".to_string() }
fn default_prefix() -> String { "donut".to_string() }

/// Failure to read or parse a configuration file
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Failed to read config {}: {}", path.display(), source)
            }
            Self::Parse(err) => write!(f, "Failed to parse config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Find and load configuration file from current directory or parents
    pub fn discover() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir),
            Err(_) => Self::default(),
        }
    }

    /// Search `start` and its ancestors; defaults if nothing loads
    pub fn discover_from(start: &Path) -> Self {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for name in CONFIG_FILES {
                let config_path = dir.join(name);
                if config_path.exists() {
                    if let Ok(config) = Self::load(&config_path) {
                        return config;
                    }
                }
            }

            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }
}

/// Install the process-wide configuration
///
/// Returns `false` if one was already installed (or already read through
/// [`current`]); the existing one stays in effect.
pub fn install(config: Config) -> bool {
    CONFIG.set(config).is_ok()
}

/// The installed configuration, or defaults if none was installed
pub fn current() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}
