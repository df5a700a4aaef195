mod file_config;

pub use file_config::{AlertsConfig, BackgroundJobsConfig, FileConfig};

use crate::alerts::{RunnerSettings, DEFAULT_SEARCH_PAGE_PATH};
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub metrics_port: u16,
    pub alert_interval_minutes: Option<u64>,
    pub call_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub metrics_port: u16,
    pub alerts: AlertSettings,
    pub background_jobs: BackgroundJobsSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSettings {
    pub interval_minutes: u64,
    pub call_timeout_secs: u64,
    pub lease_ttl_secs: u64,
    pub search_page_path: String,
    pub run_on_startup: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            call_timeout_secs: 30,
            // Kept below the interval.
            lease_ttl_secs: 55 * 60,
            search_page_path: DEFAULT_SEARCH_PAGE_PATH.to_string(),
            run_on_startup: false,
        }
    }
}

impl AlertSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            lease_ttl: Duration::from_secs(self.lease_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJobsSettings {
    pub history_retention_days: u64,
}

impl Default for BackgroundJobsSettings {
    fn default() -> Self {
        Self {
            history_retention_days: 30,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let defaults = AlertSettings::default();
        let alerts_file = file.alerts.unwrap_or_default();
        let alerts = AlertSettings {
            interval_minutes: alerts_file
                .interval_minutes
                .or(cli.alert_interval_minutes)
                .unwrap_or(defaults.interval_minutes),
            call_timeout_secs: alerts_file
                .call_timeout_secs
                .or(cli.call_timeout_secs)
                .unwrap_or(defaults.call_timeout_secs),
            lease_ttl_secs: alerts_file
                .lease_ttl_secs
                .unwrap_or(defaults.lease_ttl_secs),
            search_page_path: alerts_file
                .search_page_path
                .unwrap_or(defaults.search_page_path),
            run_on_startup: alerts_file
                .run_on_startup
                .unwrap_or(defaults.run_on_startup),
        };

        if alerts.interval_minutes == 0 {
            bail!("alerts.interval_minutes must be greater than zero");
        }
        if alerts.call_timeout_secs == 0 {
            bail!("alerts.call_timeout_secs must be greater than zero");
        }
        if !alerts.search_page_path.starts_with('/') {
            bail!(
                "alerts.search_page_path must start with '/': {:?}",
                alerts.search_page_path
            );
        }

        let jobs_file = file.background_jobs.unwrap_or_default();
        let background_jobs = BackgroundJobsSettings {
            history_retention_days: jobs_file
                .history_retention_days
                .unwrap_or(BackgroundJobsSettings::default().history_retention_days),
        };

        Ok(Self {
            db_dir,
            metrics_port,
            alerts,
            background_jobs,
        })
    }

    pub fn marketplace_db_path(&self) -> PathBuf {
        self.db_dir.join("marketplace.db")
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.db_dir.join("server.db")
    }
}
