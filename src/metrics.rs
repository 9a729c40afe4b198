use std::time::Duration;

use metrics::{counter, histogram};

/// Metric names emitted by the pipeline stages
///
/// Values go through the `metrics` facade; without an installed recorder
/// every call is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector {
    // Ingestion metrics
    pub messages_fetched_total: &'static str,
    pub messages_ingested_total: &'static str,

    // Classification metrics
    pub messages_classified_total: &'static str,
    pub classification_failures_total: &'static str,
    pub reports_aggregated_total: &'static str,

    // Run metrics
    pub stage_duration: &'static str,
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            messages_fetched_total: "flood_monitor_messages_fetched_total",
            messages_ingested_total: "flood_monitor_messages_ingested_total",

            messages_classified_total: "flood_monitor_messages_classified_total",
            classification_failures_total: "flood_monitor_classification_failures_total",
            reports_aggregated_total: "flood_monitor_reports_aggregated_total",

            stage_duration: "flood_monitor_stage_duration_seconds",
            errors_total: "flood_monitor_errors_total",
        }
    }
}

impl MetricsCollector {
    /// Record one ingestion run
    pub fn record_ingestion(&self, fetched: usize, added: usize, duration: Duration) {
        counter!(self.messages_fetched_total).increment(fetched as u64);
        counter!(self.messages_ingested_total).increment(added as u64);
        histogram!(self.stage_duration, "stage" => "ingest").record(duration.as_secs_f64());
    }

    /// Record one successfully classified message
    pub fn record_classification(&self, label: &'static str) {
        counter!(self.messages_classified_total, "label" => label).increment(1);
    }

    /// Record one message the classifier could not label
    pub fn record_classification_failure(&self, kind: &'static str) {
        counter!(self.classification_failures_total, "type" => kind).increment(1);
    }

    /// Record one increment applied to the location aggregate
    pub fn record_report_aggregated(&self) {
        counter!(self.reports_aggregated_total).increment(1);
    }

    /// Record the duration of a classification or rebuild run
    pub fn record_stage_duration(&self, stage: &'static str, duration: Duration) {
        histogram!(self.stage_duration, "stage" => stage).record(duration.as_secs_f64());
    }

    /// Record a run-level error
    pub fn record_error(&self, error_type: &'static str, stage: &'static str) {
        counter!(self.errors_total, "type" => error_type, "stage" => stage).increment(1);
    }
}
