//! Configuration for the accrual job

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Accrual job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Ledger data directory
    pub ledger_data_dir: PathBuf,

    /// Job parameters
    pub job: JobConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "accrual-job".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger_data_dir: PathBuf::from("./data/ledger"),
            job: JobConfig::default(),
        }
    }
}

/// Job parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Accrual periods per year (12 = monthly)
    pub periods_per_year: u32,

    /// Scheduler tick interval in seconds
    ///
    /// Ticks inside an already-processed period are no-ops, so this only
    /// bounds how late after a period boundary the run starts.
    pub tick_interval_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 12,
            tick_interval_secs: 300,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("ACCRUAL_LEDGER_DATA_DIR") {
            config.ledger_data_dir = PathBuf::from(data_dir);
        }

        if let Ok(periods) = std::env::var("ACCRUAL_PERIODS_PER_YEAR") {
            config.job.periods_per_year = periods
                .parse()
                .map_err(|e| Error::Config(format!("Invalid ACCRUAL_PERIODS_PER_YEAR: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.job.periods_per_year == 0 {
            return Err(Error::Config(
                "periods_per_year must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
