//! Observability infrastructure for the reconciliation job
//!
//! Provides:
//! - Prometheus metrics (records processed, inserted, failures, latencies)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Encoder,
    Gauge, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-record enrichment latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RunMetricsInner> = OnceLock::new();

struct RunMetricsInner {
    records_processed: IntCounter,
    records_inserted: IntCounter,
    record_failures: IntCounterVec,
    enrichment_latency_seconds: Histogram,
    run_duration_seconds: Gauge,
    last_success_timestamp: Gauge,
}

impl RunMetricsInner {
    fn new() -> Self {
        Self {
            records_processed: register_int_counter!(
                "ec2_reconciler_records_processed_total",
                "Raw records taken from the resource index"
            )
            .expect("Failed to register records_processed"),

            records_inserted: register_int_counter!(
                "ec2_reconciler_records_inserted_total",
                "Snapshots written to the snapshot store"
            )
            .expect("Failed to register records_inserted"),

            record_failures: register_int_counter_vec!(
                "ec2_reconciler_record_failures_total",
                "Per-record failures by reason",
                &["reason"]
            )
            .expect("Failed to register record_failures"),

            enrichment_latency_seconds: register_histogram!(
                "ec2_reconciler_enrichment_latency_seconds",
                "Time spent enriching and storing one record",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register enrichment_latency_seconds"),

            run_duration_seconds: register_gauge!(
                "ec2_reconciler_run_duration_seconds",
                "Wall-clock duration of the last run"
            )
            .expect("Failed to register run_duration_seconds"),

            last_success_timestamp: register_gauge!(
                "ec2_reconciler_last_completed_timestamp_seconds",
                "Unix time at which the last run completed"
            )
            .expect("Failed to register last_success_timestamp"),
        }
    }
}

/// Why a record ended up in the failure report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Parse,
    Enrichment,
    Timeout,
    MissingNameTag,
    Store,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Parse => "parse",
            FailureReason::Enrichment => "enrichment",
            FailureReason::Timeout => "timeout",
            FailureReason::MissingNameTag => "missing_name_tag",
            FailureReason::Store => "store",
        }
    }
}

/// Handle to the process-wide run metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct RunMetrics {
    _private: (),
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RunMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RunMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn add_processed(&self, count: usize) {
        self.inner().records_processed.inc_by(count as u64);
    }

    pub fn inc_inserted(&self) {
        self.inner().records_inserted.inc();
    }

    pub fn inc_failure(&self, reason: FailureReason) {
        self.inner()
            .record_failures
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    pub fn observe_enrichment_latency(&self, duration_secs: f64) {
        self.inner().enrichment_latency_seconds.observe(duration_secs);
    }

    /// Record the end of a run
    pub fn set_run_completed(&self, duration_secs: f64, finished_at_unix: i64) {
        self.inner().run_duration_seconds.set(duration_secs);
        self.inner()
            .last_success_timestamp
            .set(finished_at_unix as f64);
    }

    /// Render every registered metric in the text exposition format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Write the exposition to a node-exporter textfile.
    ///
    /// The file is replaced atomically through a sibling temp file.
    pub fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        let rendered = self.render()?;
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, rendered)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Structured logger for run events
///
/// Every event carries the `event` field and the target table, so runs can
/// be followed in the JSON log stream.
#[derive(Clone)]
pub struct StructuredLogger {
    table_name: String,
}

impl StructuredLogger {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }

    pub fn log_run_started(&self, recorded_date: &str, aggregator: &str) {
        info!(
            event = "run_started",
            table = %self.table_name,
            recorded_date = %recorded_date,
            aggregator = %aggregator,
            "Reconciliation run started"
        );
    }

    pub fn log_inventory_loaded(&self, records: usize, instance_types: usize) {
        info!(
            event = "inventory_loaded",
            table = %self.table_name,
            records = records,
            instance_types = instance_types,
            "Loaded raw inventory"
        );
    }

    pub fn log_record_failed(
        &self,
        resource_id: &str,
        reason: FailureReason,
        availability_zone: Option<&str>,
        message: &str,
    ) {
        warn!(
            event = "record_failed",
            table = %self.table_name,
            resource_id = %resource_id,
            reason = reason.as_str(),
            availability_zone = ?availability_zone,
            message = %message,
            "Record not stored"
        );
    }

    pub fn log_run_completed(&self, recorded_date: &str, inserted: usize, errors: usize, duration_secs: f64) {
        info!(
            event = "run_completed",
            table = %self.table_name,
            recorded_date = %recorded_date,
            update_count = inserted,
            error = errors,
            duration_secs = duration_secs,
            "Reconciliation run completed"
        );
    }

    pub fn log_run_aborted(&self, recorded_date: &str, error: &str) {
        warn!(
            event = "run_aborted",
            table = %self.table_name,
            recorded_date = %recorded_date,
            error = %error,
            "Reconciliation run aborted"
        );
    }

    pub fn log_notification(&self, recipients: usize, error: Option<&str>) {
        match error {
            None => info!(
                event = "notification_sent",
                table = %self.table_name,
                recipients = recipients,
                "Failure report dispatched"
            ),
            Some(error) => warn!(
                event = "notification_failed",
                table = %self.table_name,
                recipients = recipients,
                error = %error,
                "Failure report could not be dispatched"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render_after_updates() {
        let metrics = RunMetrics::new();
        metrics.add_processed(3);
        metrics.inc_inserted();
        metrics.inc_failure(FailureReason::MissingNameTag);
        metrics.observe_enrichment_latency(0.2);
        metrics.set_run_completed(1.5, 1_714_521_600);

        let text = metrics.render().unwrap();

        assert!(text.contains("ec2_reconciler_records_processed_total"));
        assert!(text.contains("reason=\"missing_name_tag\""));
        assert!(text.contains("ec2_reconciler_run_duration_seconds"));
    }

    #[test]
    fn test_write_textfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reconciler.prom");

        let metrics = RunMetrics::new();
        metrics.inc_inserted();
        metrics.write_textfile(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("ec2_reconciler_records_inserted_total"));
        assert!(!path.with_extension("prom.tmp").exists());
    }

    #[test]
    fn test_failure_reason_labels() {
        assert_eq!(FailureReason::Store.as_str(), "store");
        assert_eq!(FailureReason::Timeout.as_str(), "timeout");
    }
}
