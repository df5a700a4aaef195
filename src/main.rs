use anyhow::{Context, Result};
use clap::Parser;
use sentinelle::alerts::{AlertComposer, AlertRunner, RunOutcome};
use sentinelle::background_jobs::create_scheduler;
use sentinelle::background_jobs::jobs::{JobHistoryCleanupJob, SavedSearchAlertsJob};
use sentinelle::config::{AppConfig, CliConfig, FileConfig};
use sentinelle::metrics;
use sentinelle::server_store::{JobRunStatus, ServerStore, ServerStoreLease, SqliteServerStore};
use sentinelle::SqliteMarketplaceStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override command line flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding marketplace.db and server.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,

    /// Minutes between two alert runs.
    #[clap(long)]
    pub interval_minutes: Option<u64>,

    /// Timeout in seconds for each call to the saved search store, inventory and notifications.
    #[clap(long)]
    pub call_timeout_secs: Option<u64>,

    /// Perform a single alert run, print its summary as JSON and exit.
    #[clap(long)]
    pub once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        metrics_port: cli_args.metrics_port,
        alert_interval_minutes: cli_args.interval_minutes,
        call_timeout_secs: cli_args.call_timeout_secs,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!(
        "Opening marketplace database at {:?}...",
        config.marketplace_db_path()
    );
    let marketplace = Arc::new(SqliteMarketplaceStore::new(config.marketplace_db_path())?);

    info!("Opening server database at {:?}...", config.server_db_path());
    let server_store: Arc<dyn ServerStore> =
        Arc::new(SqliteServerStore::new(config.server_db_path())?);

    let runner = Arc::new(AlertRunner::new(
        marketplace.clone(),
        marketplace.clone(),
        marketplace,
        Arc::new(ServerStoreLease::new(server_store.clone())),
        AlertComposer::new(config.alerts.search_page_path.clone()),
        config.alerts.runner_settings(),
    ));

    if cli_args.once {
        let run_id = server_store.record_job_start("saved_search_alerts", "once")?;
        let summary = runner.run(&CancellationToken::new()).await;
        let (status, error_message) = match &summary.outcome {
            RunOutcome::Aborted(reason) => (JobRunStatus::Failed, Some(reason.clone())),
            RunOutcome::LeaseLost => (JobRunStatus::Failed, Some("Lease lost".to_string())),
            _ => (JobRunStatus::Completed, None),
        };
        server_store.record_job_finish(run_id, status, error_message)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let shutdown_token = CancellationToken::new();
    let mut scheduler = create_scheduler(server_store.clone(), shutdown_token.clone());
    scheduler.register_job(Arc::new(SavedSearchAlertsJob::new(
        runner,
        config.alerts.interval(),
        config.alerts.run_on_startup,
    )));
    scheduler.register_job(Arc::new(JobHistoryCleanupJob::new(
        config.background_jobs.history_retention_days,
    )));

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run().await;
    });

    info!(
        "Alerts every {} minutes, metrics available at port {}",
        config.alerts.interval_minutes, config.metrics_port
    );

    tokio::select! {
        result = metrics::run_metrics_server(config.metrics_port) => {
            if let Err(e) = result {
                error!("Metrics server failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    shutdown_token.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task failed: {}", e);
    }

    Ok(())
}
