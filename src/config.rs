use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::{Context, OptionExt};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where session checkpoints are kept between runs
    checkpoint_directory: Option<String>,
    pub youtube: YoutubeConfig,
    pub matching: MatchingConfig,
    pub governor: GovernorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    pub api_base_url: String,
    /// `private`, `unlisted` or `public`
    pub privacy_status: String,
    /// Maximum number of candidates fetched per search
    pub search_limit: usize,
    /// Label of the destination account, part of the checkpoint key
    pub account: String,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/youtube/v3/".to_string(),
            privacy_status: "private".to_string(),
            search_limit: 5,
            account: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub title_weight: f64,
    pub artist_weight: f64,
    /// Minimum score for a candidate to be accepted
    pub accept_threshold: f64,
    /// Minimum lead the best candidate needs over the runner-up
    pub ambiguity_margin: f64,
    pub duration_tolerance_secs: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            title_weight: 0.6,
            artist_weight: 0.4,
            accept_threshold: 0.75,
            ambiguity_margin: 0.10,
            duration_tolerance_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Minimum spacing between two API calls, 0 disables throttling
    pub min_interval_ms: u64,
    /// Total attempts per call, including the first one
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

impl GovernorConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("rimusic2yt").join("config.toml"))
    }

    /// Load the default config file, falling back to built-in defaults when it does not exist
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the default config to the default path, unless a file is already there
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_eyre("Could not determine config directory")?;
        if path.exists() {
            tracing::info!("Config file already exists at {}", path.display());
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    /// Get the expanded checkpoint directory
    pub fn checkpoint_directory(&self) -> Result<PathBuf> {
        match &self.checkpoint_directory {
            Some(directory) => Ok(self.expand_path(directory)),
            None => dirs::data_dir()
                .map(|dir| dir.join("rimusic2yt").join("checkpoints"))
                .ok_or_eyre("Could not determine data directory for checkpoints"),
        }
    }
}
