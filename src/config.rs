//! `config.toml` handling.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{BookSettings, EditMode, RetainedEarningsPolicy, Thresholds};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub edit_mode: EditMode,
    pub retained_earnings: RetainedEarningsPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            edit_mode: EditMode::Propagate,
            retained_earnings: RetainedEarningsPolicy::Derived,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON file per collection.
    pub data_dir: PathBuf,
    /// Serve repeated collection reads from memory.
    pub cache: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("loan-book-data"),
            cache: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub classification: Thresholds,
    pub ledger: LedgerConfig,
    pub store: StoreConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(PathBuf),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(p) => write!(f, "config file {} not found", p.display()),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cfg: Config = toml::from_str(s).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|_| ConfigError::Missing(path.to_path_buf()))?;
        data.parse()
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.classification;
        if c.days_per_month <= 0 {
            return Err(ConfigError::Invalid(
                "classification.days_per_month must be positive".into(),
            ));
        }
        if c.bad_debt_days < 0 || c.about_to_overdue_months < 0 {
            return Err(ConfigError::Invalid(
                "classification thresholds must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn book_settings(&self) -> BookSettings {
        BookSettings {
            thresholds: self.classification,
            edit_mode: self.ledger.edit_mode,
            retained_earnings: self.ledger.retained_earnings,
        }
    }
}
