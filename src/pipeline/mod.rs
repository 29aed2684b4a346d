// Claims pipeline: ingestion, processing, loading, reconciliation

pub mod ingestion;
pub mod loader;
pub mod orchestrator;
pub mod processing;
pub mod reconcile;
pub mod storage;

pub use orchestrator::{run_pipeline, Pipeline, RunSummary};
