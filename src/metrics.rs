use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounter, Opts,
    Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Sentinelle metrics
const PREFIX: &str = "sentinelle";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Alert runs
    pub static ref ALERT_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_alert_runs_total"), "Alert runs by outcome"),
        &["outcome"]
    ).expect("Failed to create alert_runs_total metric");

    pub static ref ALERT_RUN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_alert_run_duration_seconds"),
            "Duration of a full alert run in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0])
    ).expect("Failed to create alert_run_duration_seconds metric");

    pub static ref SAVED_SEARCHES_PROCESSED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_saved_searches_processed_total"),
        "Active saved searches considered by alert runs"
    ).expect("Failed to create saved_searches_processed_total metric");

    pub static ref ALERTS_SENT_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_alerts_sent_total"),
        "Saved-search alerts delivered"
    ).expect("Failed to create alerts_sent_total metric");

    pub static ref ALERT_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_alert_failures_total"), "Per-search alert failures by stage"),
        &["stage"]
    ).expect("Failed to create alert_failures_total metric");

    // Background jobs
    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_executions_total"), "Background job executions"),
        &["job_id", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job duration in seconds"
        )
        .buckets(vec![0.1, 1.0, 10.0, 60.0, 300.0, 1800.0]),
        &["job_id"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref BACKGROUND_JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_background_job_running"), "Whether a background job is running"),
        &["job_id"]
    ).expect("Failed to create background_job_running metric");
}

/// Register all metrics with the registry. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(ALERT_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ALERT_RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SAVED_SEARCHES_PROCESSED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ALERTS_SENT_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ALERT_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNNING.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_alert_run(outcome: &str, processed: usize, notified: usize, duration: Duration) {
    ALERT_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    ALERT_RUN_DURATION_SECONDS.observe(duration.as_secs_f64());
    SAVED_SEARCHES_PROCESSED_TOTAL.inc_by(processed as u64);
    ALERTS_SENT_TOTAL.inc_by(notified as u64);
}

pub fn record_alert_failure(stage: &str) {
    ALERT_FAILURES_TOTAL.with_label_values(&[stage]).inc();
}

pub fn record_background_job_execution(job_id: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job_id, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_id])
        .observe(duration.as_secs_f64());
}

pub fn set_background_job_running(job_id: &str, running: bool) {
    BACKGROUND_JOB_RUNNING
        .with_label_values(&[job_id])
        .set(if running { 1.0 } else { 0.0 });
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Serve `/metrics` for Prometheus scraping until the listener fails.
pub async fn run_metrics_server(port: u16) -> anyhow::Result<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family_exists(name: &str) -> bool {
        REGISTRY
            .gather()
            .iter()
            .any(|m| m.get_name() == format!("{PREFIX}_{name}"))
    }

    #[test]
    fn test_metrics_initialization() {
        init_metrics();
        init_metrics();

        let metric_families = REGISTRY.gather();
        assert!(!metric_families.is_empty(), "Metrics should be registered");
    }

    #[test]
    fn test_record_alert_run() {
        init_metrics();

        let before = ALERTS_SENT_TOTAL.get();
        record_alert_run("completed", 3, 2, Duration::from_millis(120));

        assert!(ALERTS_SENT_TOTAL.get() >= before + 2);
        assert!(family_exists("alert_runs_total"));
    }

    #[test]
    fn test_record_alert_failure() {
        init_metrics();

        record_alert_failure("delivery");
        assert!(ALERT_FAILURES_TOTAL.with_label_values(&["delivery"]).get() >= 1.0);
        assert!(family_exists("alert_failures_total"));
    }

    #[test]
    fn test_background_job_metrics() {
        init_metrics();

        set_background_job_running("test_job", true);
        assert_eq!(
            BACKGROUND_JOB_RUNNING.with_label_values(&["test_job"]).get(),
            1.0
        );
        record_background_job_execution("test_job", "success", Duration::from_secs(1));
        set_background_job_running("test_job", false);
        assert_eq!(
            BACKGROUND_JOB_RUNNING.with_label_values(&["test_job"]).get(),
            0.0
        );
    }

    #[tokio::test]
    async fn test_metrics_handler_renders_text() {
        init_metrics();
        record_alert_failure("search");

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
