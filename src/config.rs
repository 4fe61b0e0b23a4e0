//! Engine configuration: JSON load/save and the rules-file collaborator.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// System-wide default config location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hostguard/config.json";

/// Engine configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master switch; when false every event is allowed untouched.
    pub enabled: bool,

    /// Diagnostic verbosity: 0=error, 1=warn, 2=info, 3=debug.
    pub log_level: u32,

    /// Soft cap on the total rule count; 0 means unlimited.
    pub max_rules: u32,

    /// Where this configuration is persisted.
    pub config_file: String,

    /// Rules file (one rule per line, `category|action|priority|target|description`)
    /// consumed by reload. None disables reload population.
    pub rules_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: 2,
            max_rules: 1000,
            config_file: DEFAULT_CONFIG_PATH.to_string(),
            rules_file: None,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations, falling back to
    /// defaults when none parses.
    pub fn load() -> Self {
        let config_paths = [
            dirs::home_dir().map(|p| p.join(".config/hostguard/config.json")),
            Some(PathBuf::from(DEFAULT_CONFIG_PATH)),
        ];

        for path in config_paths.into_iter().flatten() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => {
                        log::warn!("failed to parse {}: {}", path.display(), e);
                    }
                }
            }
        }

        Config::default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Persist to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Persist to the configured `config_file` path.
    pub fn save(&self) -> Result<(), Error> {
        self.save_to(&Self::expand_path(&self.config_file))
    }

    /// Expand a leading `~/` to the user's home directory.
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Expanded rules-file path, if configured.
    pub fn rules_path(&self) -> Option<PathBuf> {
        self.rules_file.as_deref().map(Self::expand_path)
    }

    /// The `log` filter corresponding to the configured level.
    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.log_level {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }
}
