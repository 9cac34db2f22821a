use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid config {path}: {source}")]
    TomlDe {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("no config directory on this platform")]
    NoConfigDir,
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub board: BoardSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSection {
    #[serde(default = "default_pipeline_id")]
    pub pipeline_id: String,
    /// Height of one lead card, in terminal lines.
    #[serde(default = "default_row_height")]
    pub row_height: u16,
    /// Cards mounted above and below the visible part of a column.
    #[serde(default = "default_overscan")]
    pub overscan: u16,
    #[serde(default = "default_tag_ttl_secs")]
    pub tag_ttl_secs: u64,
    /// Periodic lead refresh. 0 = disabled.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_pipeline_id() -> String {
    "sales".to_string()
}
fn default_row_height() -> u16 {
    5
}
fn default_overscan() -> u16 {
    5
}
fn default_tag_ttl_secs() -> u64 {
    300
}
fn default_refresh_secs() -> u64 {
    60
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            pipeline_id: default_pipeline_id(),
            row_height: default_row_height(),
            overscan: default_overscan(),
            tag_ttl_secs: default_tag_ttl_secs(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

impl BackendSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BoardSection {
    pub fn tag_ttl(&self) -> Duration {
        Duration::from_secs(self.tag_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_secs > 0).then(|| Duration::from_secs(self.refresh_secs))
    }
}

impl Config {
    /// Reject settings the board cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board.row_height < 3 {
            return Err(ConfigError::Invalid {
                key: "board.row_height",
                reason: format!("{} is too small, cards need at least 3 lines", self.board.row_height),
            });
        }
        if self.board.overscan == 0 {
            return Err(ConfigError::Invalid {
                key: "board.overscan",
                reason: "must be at least 1, or the partly scrolled bottom card is not drawn".into(),
            });
        }
        if self.board.pipeline_id.trim().is_empty() {
            return Err(ConfigError::Invalid { key: "board.pipeline_id", reason: "must not be empty".into() });
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid { key: "backend.base_url", reason: "must not be empty".into() });
        }
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/leadboard/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("leadboard").join("config.toml"))
}

/// Directory for the log file.
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("leadboard")
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, the default location is used
/// if present and built-in defaults otherwise.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            read(path)?
        }
        None => match default_config_path() {
            Some(path) if path.exists() => read(&path)?,
            _ => Config::default(),
        },
    };
    config.validate()?;
    Ok(config)
}

fn read(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|source| ConfigError::TomlDe { path: path.to_path_buf(), source })
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, text)?;
    Ok(())
}
