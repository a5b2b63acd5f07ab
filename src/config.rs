use eyre::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub defaults: RunDefaults,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    pub repetitions: u32,
    pub delay_ms: u64,
    pub stop_on_error: bool,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            repetitions: 1,
            delay_ms: 0,
            stop_on_error: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("autotask")
                .join("state"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            defaults: RunDefaults::default(),
            storage: StorageConfig::default(),
        }
    }
}

const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // An explicit path must load; no fallback
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidate_paths().into_iter().filter(|p| p.exists()) {
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => log::warn!("Failed to load config from {}: {:#}", candidate.display(), e),
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Implicit config locations, most specific first:
    /// `<config_dir>/autotask/autotask.yml`, then `./autotask.yml`
    fn candidate_paths() -> Vec<PathBuf> {
        let file_name = format!("{}.yml", PROJECT_NAME);
        dirs::config_dir()
            .map(|dir| dir.join(PROJECT_NAME).join(&file_name))
            .into_iter()
            .chain(std::iter::once(PathBuf::from(&file_name)))
            .collect()
    }

    /// Level applied when RUST_LOG is not set; unknown names fall back to info
    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level
            .as_deref()
            .and_then(|level| level.parse().ok())
            .unwrap_or(LevelFilter::Info)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
