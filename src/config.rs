use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::constants::*;
use crate::error::{PipelineError, Result};
use crate::pipeline::ingestion::SourcePaths;
use crate::pipeline::loader::LoaderConfig;

pub const CONFIG_PATH_ENV: &str = "CLAIMS_GRAPH_CONFIG";
pub const STORE_PATH_ENV: &str = "CLAIMS_GRAPH_STORE_PATH";
pub const BATCH_SIZE_ENV: &str = "CLAIMS_GRAPH_BATCH_SIZE";
pub const REFERENCE_DATE_ENV: &str = "CLAIMS_GRAPH_REFERENCE_DATE";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    /// Date ages are computed against; required, never taken from the clock
    pub reference_date: Option<NaiveDate>,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub data_dir: PathBuf,
    pub provider_file: String,
    pub beneficiary_file: String,
    pub inpatient_file: String,
    pub outpatient_file: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            provider_file: DEFAULT_PROVIDER_FILE.to_string(),
            beneficiary_file: DEFAULT_BENEFICIARY_FILE.to_string(),
            inpatient_file: DEFAULT_INPATIENT_FILE.to_string(),
            outpatient_file: DEFAULT_OUTPATIENT_FILE.to_string(),
        }
    }
}

impl InputConfig {
    pub fn source_paths(&self) -> SourcePaths<PathBuf> {
        SourcePaths {
            provider: self.data_dir.join(&self.provider_file),
            beneficiary: self.data_dir.join(&self.beneficiary_file),
            inpatient: self.data_dir.join(&self.inpatient_file),
            outpatient: self.data_dir.join(&self.outpatient_file),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("data/claims_graph.db"),
        }
    }
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Config {
    /// Reads `.env`, then the TOML file named by `CLAIMS_GRAPH_CONFIG`
    /// (default `config.toml`), then applies env overrides and validates.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path, e
            ))
        })?;

        let mut config = Self::from_toml_str(&config_content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(STORE_PATH_ENV) {
            self.store.path = PathBuf::from(path);
        }
        if let Some(size) = lookup(BATCH_SIZE_ENV) {
            self.loader.batch_size = size.trim().parse().map_err(|e| {
                PipelineError::Config(format!("{} must be an integer: {}", BATCH_SIZE_ENV, e))
            })?;
        }
        if let Some(date) = lookup(REFERENCE_DATE_ENV) {
            let parsed = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|e| {
                PipelineError::Config(format!(
                    "{} must be a {} date: {}",
                    REFERENCE_DATE_ENV, DATE_FORMAT, e
                ))
            })?;
            self.reference_date = Some(parsed);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.reference_date.is_none() {
            return Err(PipelineError::Config(format!(
                "reference_date is required (set it in the config file or {})",
                REFERENCE_DATE_ENV
            )));
        }
        if self.loader.batch_size == 0 {
            return Err(PipelineError::Config(
                "loader.batch_size must be at least 1".to_string(),
            ));
        }
        if self.loader.max_in_flight == 0 {
            return Err(PipelineError::Config(
                "loader.max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reference_date(&self) -> Result<NaiveDate> {
        self.reference_date
            .ok_or_else(|| PipelineError::Config("reference_date is not set".to_string()))
    }
}
