use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "CMDSET_HOME";
pub const EVENTS_PATH_ENV: &str = "CMDSET_EVENTS_PATH";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub last: LastConfig,
    pub pick: PickConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    // Overrides <base>/events.jsonl; CMDSET_EVENTS_PATH still wins
    pub events_path: Option<PathBuf>,
    // Overrides <base>/state
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LastConfig {
    pub num: usize,
}

impl Default for LastConfig {
    fn default() -> Self {
        Self { num: 30 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PickConfig {
    pub num: usize,
    // Drop ls/cd/pwd/clear/exit before numbering
    pub exclude_common: bool,
    pub exclude_regex: Vec<String>,
}

impl Default for PickConfig {
    fn default() -> Self {
        Self {
            num: 50,
            exclude_common: true,
            exclude_regex: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    // "bash" or "md"
    pub format: String,
    pub redact_regex: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: "bash".to_string(),
            redact_regex: Vec::new(),
        }
    }
}

impl Config {
    /// Load `<base>/config.toml`, writing the defaults there on first run.
    pub fn new() -> Result<Self> {
        Self::load_or_init(&Self::get_config_path())
    }

    pub fn load_or_init(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("failed to read config {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("failed to parse config {}", config_path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(config_dir) = config_path.parent() {
            fs::create_dir_all(config_dir)
                .with_context(|| format!("failed to create {}", config_dir.display()))?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)
            .with_context(|| format!("failed to write config {}", config_path.display()))?;
        Ok(())
    }

    /// `$CMDSET_HOME`, falling back to `~/.cmdset`.
    pub fn base_dir() -> PathBuf {
        match std::env::var_os(HOME_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".cmdset"),
        }
    }

    fn get_config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    /// Events log location: environment first, then config, then `<base>/events.jsonl`.
    pub fn effective_events_path(&self, base_dir: &Path) -> PathBuf {
        std::env::var_os(EVENTS_PATH_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.storage.events_path.clone())
            .unwrap_or_else(|| base_dir.join("events.jsonl"))
    }

    pub fn effective_state_dir(&self, base_dir: &Path) -> PathBuf {
        self.storage
            .state_dir
            .clone()
            .unwrap_or_else(|| base_dir.join("state"))
    }
}
