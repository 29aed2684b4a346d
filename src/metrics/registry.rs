//! Registers every phase's metrics and flags name collisions between phases.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::normalize::NormalizeMetrics>(&mut all_metrics);
    register_phase_metrics::<super::loader::LoaderMetrics>(&mut all_metrics);
    register_phase_metrics::<super::reconcile::ReconcileMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all phases",
        all_metrics.len()
    );
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<String, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict: '{}' registered again by phase '{}'",
                doc.name, phase_name
            );
            continue;
        }
        debug!(
            "  - {} ({:?}, labels {:?}): {}",
            doc.name, doc.metric_type, doc.labels, doc.help
        );
        all_metrics.insert(doc.name.to_string(), doc);
    }
}

/// Phase segment of a metric name, e.g. `claims_graph_loader_batch_retries_total` -> `loader`.
pub fn phase_of(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("claims_graph_")
        .and_then(|rest| rest.split('_').next())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{LoaderMetrics, NormalizeMetrics, ReconcileMetrics};
    use std::collections::HashSet;

    #[test]
    fn test_phase_of() {
        assert_eq!(phase_of("claims_graph_loader_batch_retries_total"), "loader");
        assert_eq!(phase_of("claims_graph_reconcile_duration_seconds"), "reconcile");
        assert_eq!(phase_of("http_requests_total"), "unknown");
    }

    #[test]
    fn test_metric_names_are_unique_and_prefixed_by_phase() {
        let docs = [
            NormalizeMetrics::metrics_documentation(),
            LoaderMetrics::metrics_documentation(),
            ReconcileMetrics::metrics_documentation(),
        ];
        let phases = [
            NormalizeMetrics::phase_name(),
            LoaderMetrics::phase_name(),
            ReconcileMetrics::phase_name(),
        ];

        let mut seen = HashSet::new();
        for (docs, phase) in docs.iter().zip(phases) {
            for doc in docs {
                assert!(seen.insert(doc.name), "duplicate metric {}", doc.name);
                assert_eq!(phase_of(doc.name), phase);
            }
        }
    }
}
