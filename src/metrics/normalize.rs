//! Normalizer phase metrics: rows read, kept and dropped per source table.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::pipeline::processing::normalize::QualityReport;

pub struct NormalizeMetrics;

impl NormalizeMetrics {
    /// Records the tallies of a finished normalization pass.
    pub fn record_quality(report: &QualityReport) {
        for (table, quality) in &report.tables {
            let table = table.as_str();
            ::metrics::counter!(phase_metric!(counter, "normalize", "rows_read"), "table" => table)
                .increment(quality.rows_read);
            ::metrics::counter!(phase_metric!(counter, "normalize", "rows_kept"), "table" => table)
                .increment(quality.rows_kept);
            ::metrics::counter!(phase_metric!(counter, "normalize", "rows_dropped"), "table" => table)
                .increment(quality.rows_dropped);
            ::metrics::counter!(phase_metric!(counter, "normalize", "invalid_values"), "table" => table)
                .increment(quality.invalid_values.values().sum());
        }
    }

    pub fn record_duration(duration_secs: f64) {
        ::metrics::histogram!(phase_metric!(histogram, "normalize", "duration_seconds"))
            .record(duration_secs);
    }
}

impl PhaseMetrics for NormalizeMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "normalize", "rows_read"));
        let _ = counter!(phase_metric!(counter, "normalize", "rows_kept"));
        let _ = counter!(phase_metric!(counter, "normalize", "rows_dropped"));
        let _ = counter!(phase_metric!(counter, "normalize", "invalid_values"));
        let _ = histogram!(phase_metric!(histogram, "normalize", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "normalize"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "normalize", "rows_read"),
                metric_type: MetricType::Counter,
                help: "Source rows read per table",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "normalize", "rows_kept"),
                metric_type: MetricType::Counter,
                help: "Rows that passed the mandatory-key check",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "normalize", "rows_dropped"),
                metric_type: MetricType::Counter,
                help: "Rows dropped for a missing mandatory key",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "normalize", "invalid_values"),
                metric_type: MetricType::Counter,
                help: "Unparsable dates, amounts and flags treated as null",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "normalize", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of the normalization pass",
                labels: vec![],
            },
        ]
    }
}
