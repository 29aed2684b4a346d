use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct ReconcileMetrics;

impl ReconcileMetrics {
    pub fn record_run(checks: usize, mismatches: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "reconcile", "checks")).increment(checks as u64);
        ::metrics::counter!(phase_metric!(counter, "reconcile", "mismatches"))
            .increment(mismatches as u64);
        ::metrics::histogram!(phase_metric!(histogram, "reconcile", "duration_seconds"))
            .record(duration_secs);
    }
}

impl PhaseMetrics for ReconcileMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "reconcile", "checks"));
        let _ = counter!(phase_metric!(counter, "reconcile", "mismatches"));
        let _ = histogram!(phase_metric!(histogram, "reconcile", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "reconcile"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "checks"),
                metric_type: MetricType::Counter,
                help: "Reconciliation checks evaluated",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "mismatches"),
                metric_type: MetricType::Counter,
                help: "Reconciliation mismatches found",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "reconcile", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of the reconciliation pass",
                labels: vec![],
            },
        ]
    }
}
