use anyhow::Context;
use tracing::{error, info, warn};

use claims_graph::config::Config;
use claims_graph::{logging, metrics, run_pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    logging::init_logging(&config.log_dir);
    metrics::init_metrics();

    let span = tracing::info_span!("claims_graph", store = ?config.store.backend);
    let _enter = span.enter();

    info!("Starting pipeline");
    let summary = run_pipeline(&config).await.context("pipeline run failed")?;
    info!("Pipeline finished");

    println!("\n📊 Claims graph run {}:", summary.run_id);
    println!("   Rows read: {}", summary.rows_read);
    println!("   Rows dropped: {}", summary.rows_dropped);
    println!("   Records inserted: {}", summary.load.total_inserted());
    println!(
        "   Records already present: {}",
        summary.load.total_already_present()
    );
    println!("   Dangling edges: {}", summary.dangling_count());
    println!("   Failed batches: {}", summary.load.batch_failures.len());
    println!("   Reconciliation mismatches: {}", summary.mismatch_count);
    if let Some(path) = &summary.reports.run_summary {
        println!("   Summary report: {}", path.display());
    }

    if !summary.success {
        warn!("Run finished with unresolved issues");
        for mismatch in &summary.reconciliation.mismatches {
            error!(
                "{:?} {}: expected {}, found {}",
                mismatch.kind, mismatch.subject, mismatch.expected, mismatch.actual
            );
        }
        std::process::exit(1);
    }

    println!("✅ Run completed successfully");
    Ok(())
}
