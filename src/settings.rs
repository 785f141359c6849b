use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "FOODIX";

/// SQLite refuses statements with more bound parameters than this.
const MAX_BOUND_PARAMS: usize = 32766;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub source: SourceConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Calorizator,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: SourceKind,
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub product_per_page: usize,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub name: StoreKind,
    pub path: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_delay_ms() -> u64 {
    2_000
}

fn default_batch_size() -> usize {
    500
}

fn default_log_level() -> String {
    "info".into()
}

impl Settings {
    /// Load a YAML config file, then apply `FOODIX_*` environment overrides
    /// (nested keys joined with `__`, e.g. `FOODIX_DB__PATH`).
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let settings: Self = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(Error::Config("source.url must not be empty".into()));
        }
        if self.source.product_per_page == 0 {
            return Err(Error::Config("source.product_per_page must be greater than 0".into()));
        }
        if self.source.timeout_ms == 0 {
            return Err(Error::Config("source.timeout_ms must be greater than 0".into()));
        }
        if self.db.batch_size == 0 {
            return Err(Error::Config("db.batch_size must be greater than 0".into()));
        }
        let params = self.db.batch_size.saturating_mul(crate::models::Product::COLUMNS.len());
        if params > MAX_BOUND_PARAMS {
            return Err(Error::Config(format!(
                "db.batch_size {} binds {} parameters per statement (max {})",
                self.db.batch_size, params, MAX_BOUND_PARAMS
            )));
        }
        Ok(())
    }
}
