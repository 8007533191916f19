use crate::models::{BatchState, SyncDirection, Watermark};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Records returned by the change poller
    pub static ref RECORDS_POLLED: CounterVec = register_counter_vec!(
        "usersync_records_polled_total",
        "Total number of changed records polled from a source system",
        &["direction"]
    ).unwrap();

    /// Records polled but left out of the outbound batch
    pub static ref RECORDS_SKIPPED: CounterVec = register_counter_vec!(
        "usersync_records_skipped_total",
        "Total number of polled records not propagated",
        &["direction", "reason"]
    ).unwrap();

    /// Per-record upsert outcomes
    pub static ref RECORDS_UPSERTED: CounterVec = register_counter_vec!(
        "usersync_records_upserted_total",
        "Total number of records applied to a destination system",
        &["direction", "outcome"]
    ).unwrap();

    /// Terminal batch job states
    pub static ref BATCH_JOBS_TOTAL: CounterVec = register_counter_vec!(
        "usersync_batch_jobs_total",
        "Total number of batch jobs by terminal state",
        &["direction", "state"]
    ).unwrap();

    /// Duration of one poll-and-apply run
    pub static ref SYNC_RUN_DURATION: HistogramVec = register_histogram_vec!(
        "usersync_run_duration_seconds",
        "Time taken by one sync run",
        &["direction", "status"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    /// Current watermark as unix seconds
    pub static ref WATERMARK_SECONDS: GaugeVec = register_gauge_vec!(
        "usersync_watermark_timestamp_seconds",
        "Current watermark of each direction",
        &["direction"]
    ).unwrap();

    /// 1 while a direction's scheduler is started
    pub static ref SCHEDULER_RUNNING: GaugeVec = register_gauge_vec!(
        "usersync_scheduler_running",
        "Whether the periodic trigger of a direction is running",
        &["direction"]
    ).unwrap();

    /// Operator API requests
    pub static ref API_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "usersync_api_requests_total",
        "Total number of operator API requests",
        &["method", "path", "status"]
    ).unwrap();

    pub static ref API_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "usersync_api_request_duration_seconds",
        "Operator API request latency",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();
}

pub fn record_polled(direction: SyncDirection, count: usize) {
    RECORDS_POLLED
        .with_label_values(&[direction.as_str()])
        .inc_by(count as f64);
}

pub fn record_skipped(direction: SyncDirection, reason: &str) {
    RECORDS_SKIPPED
        .with_label_values(&[direction.as_str(), reason])
        .inc();
}

pub fn record_upsert(direction: SyncDirection, outcome: &str) {
    RECORDS_UPSERTED
        .with_label_values(&[direction.as_str(), outcome])
        .inc();
}

pub fn record_batch(direction: SyncDirection, state: BatchState) {
    BATCH_JOBS_TOTAL
        .with_label_values(&[direction.as_str(), state.as_str()])
        .inc();
}

pub fn observe_run(direction: SyncDirection, success: bool, elapsed: Duration) {
    let status = if success { "success" } else { "failure" };
    SYNC_RUN_DURATION
        .with_label_values(&[direction.as_str(), status])
        .observe(elapsed.as_secs_f64());
}

pub fn record_watermark(direction: SyncDirection, watermark: Watermark) {
    WATERMARK_SECONDS
        .with_label_values(&[direction.as_str()])
        .set(watermark.timestamp().timestamp_millis() as f64 / 1000.0);
}

pub fn set_scheduler_running(direction: SyncDirection, running: bool) {
    SCHEDULER_RUNNING
        .with_label_values(&[direction.as_str()])
        .set(if running { 1.0 } else { 0.0 });
}

pub fn record_api_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    API_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    API_REQUEST_DURATION
        .with_label_values(&[method, path])
        .observe(elapsed.as_secs_f64());
}

/// Render all registered metrics in the text exposition format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
