//! Phase-organized metrics for the claims pipeline.
//!
//! Each pipeline phase owns its metric names in a dedicated submodule. The
//! `metrics` facade is a no-op until a recorder is installed, so phases record
//! unconditionally and the Prometheus exporter is only wired up on request.

pub mod loader;
pub mod normalize;
pub mod reconcile;
pub mod registry;

pub use loader::LoaderMetrics;
pub use normalize::NormalizeMetrics;
pub use reconcile::ReconcileMetrics;

use std::sync::Once;
use tracing::{info, warn};

/// Env var holding the `host:port` the Prometheus exporter listens on.
pub const METRICS_ADDR_ENV: &str = "CLAIMS_GRAPH_METRICS_ADDR";

static INIT: Once = Once::new();

/// Installs the Prometheus exporter when `CLAIMS_GRAPH_METRICS_ADDR` is set.
///
/// Idempotent. Without the variable nothing is installed and every metric
/// call in the phases is discarded.
pub fn init_metrics() {
    INIT.call_once(|| {
        let Ok(addr_str) = std::env::var(METRICS_ADDR_ENV) else {
            info!("{} not set, metrics exporter disabled", METRICS_ADDR_ENV);
            return;
        };

        let addr = match addr_str.parse::<std::net::SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid metrics addr '{}': {}", addr_str, e);
                return;
            }
        };

        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                info!("Prometheus exporter listening at http://{}/metrics", addr);
                registry::register_all_metrics();
            }
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

/// Implemented by each phase's metrics collection.
pub trait PhaseMetrics {
    /// Pre-registers every metric of the phase so it shows up at zero.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Metric name in the form `claims_graph_{phase}_{name}[_total]`.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("claims_graph_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("claims_graph_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("claims_graph_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
