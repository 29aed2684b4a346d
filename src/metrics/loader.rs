//! Loader phase metrics: batch writes, retries, failures and dangling edges.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct LoaderMetrics;

impl LoaderMetrics {
    pub fn record_batch_written(target: &'static str, records: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "loader", "batches_written"), "target" => target)
            .increment(1);
        ::metrics::counter!(phase_metric!(counter, "loader", "records_written"), "target" => target)
            .increment(records as u64);
        ::metrics::histogram!(phase_metric!(histogram, "loader", "batch_duration_seconds"))
            .record(duration_secs);
    }

    pub fn record_batch_retry(target: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "loader", "batch_retries"), "target" => target)
            .increment(1);
    }

    pub fn record_batch_failure(target: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "loader", "batch_failures"), "target" => target)
            .increment(1);
    }

    pub fn record_dangling_edges(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "loader", "dangling_edges"))
            .increment(count as u64);
    }
}

impl PhaseMetrics for LoaderMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "loader", "batches_written"));
        let _ = counter!(phase_metric!(counter, "loader", "records_written"));
        let _ = counter!(phase_metric!(counter, "loader", "batch_retries"));
        let _ = counter!(phase_metric!(counter, "loader", "batch_failures"));
        let _ = counter!(phase_metric!(counter, "loader", "dangling_edges"));
        let _ = histogram!(phase_metric!(histogram, "loader", "batch_duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "loader"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "loader", "batches_written"),
                metric_type: MetricType::Counter,
                help: "Batches committed to the graph store",
                labels: vec!["target"],
            },
            MetricDoc {
                name: phase_metric!(counter, "loader", "records_written"),
                metric_type: MetricType::Counter,
                help: "Records sent in committed batches",
                labels: vec!["target"],
            },
            MetricDoc {
                name: phase_metric!(counter, "loader", "batch_retries"),
                metric_type: MetricType::Counter,
                help: "Batch attempts retried after a store error",
                labels: vec!["target"],
            },
            MetricDoc {
                name: phase_metric!(counter, "loader", "batch_failures"),
                metric_type: MetricType::Counter,
                help: "Batches abandoned after exhausting retries",
                labels: vec!["target"],
            },
            MetricDoc {
                name: phase_metric!(counter, "loader", "dangling_edges"),
                metric_type: MetricType::Counter,
                help: "Edges rejected because an endpoint was missing",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "loader", "batch_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of one committed batch, retries included",
                labels: vec![],
            },
        ]
    }
}
