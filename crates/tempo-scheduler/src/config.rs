use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// Default scan cadence: once per second.
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 1_000;
/// Default number of concurrent worker slots.
pub const DEFAULT_WORKERS: usize = 4;

/// Scheduler configuration (tempo.toml + TEMPO_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay before the first scan, in milliseconds.
    #[serde(default)]
    pub initial_delay_ms: u64,
    /// Interval between scans, in milliseconds. Must be positive.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// How many task invocations may run concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// IANA timezone name used for cron calendar arithmetic.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 0,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            workers: DEFAULT_WORKERS,
            timezone: default_timezone(),
        }
    }
}

impl SchedulerConfig {
    /// Load config from a TOML file with TEMPO_* env var overrides.
    ///
    /// A missing file is fine; defaults apply, overridden by any
    /// environment variables present.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or("tempo.toml");

        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("TEMPO_"))
            .extract()
            .map_err(|e| SchedulerError::Config(e.to_string()))
    }

    /// Resolve the configured timezone name.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| SchedulerError::Config(format!("unknown timezone: {}", self.timezone)))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.check_interval_ms == 0 {
            return Err(SchedulerError::Config("check_interval_ms must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(SchedulerError::Config("workers must be > 0".into()));
        }
        self.tz()?;
        Ok(())
    }
}

fn default_check_interval_ms() -> u64 {
    DEFAULT_CHECK_INTERVAL_MS
}
fn default_workers() -> usize {
    DEFAULT_WORKERS
}
fn default_timezone() -> String {
    "UTC".to_string()
}
