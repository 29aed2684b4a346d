//! Pipeline orchestrator: read, normalize, extract, load, reconcile, report.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{Config, StoreBackend, StoreConfig};
use crate::domain::{EdgeKind, NodeKind};
use crate::error::Result;
use crate::metrics::NormalizeMetrics;
use crate::pipeline::ingestion::{read_dataset, RawDataset, SourcePaths};
use crate::pipeline::loader::{GraphLoader, LoadReport, LoaderConfig};
use crate::pipeline::processing::extract::{
    extract_graph, DanglingEdge, EntityStats, ExtractedGraph, RelationshipStats,
};
use crate::pipeline::processing::normalize::{Normalizer, QualityReport};
use crate::pipeline::reconcile::{ReconciliationReport, Reconciler};
use crate::pipeline::storage::{GraphStore, InMemoryGraphStore, SqliteGraphStore};

/// What extraction produced, as reported in the run summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionSummary {
    pub nodes: BTreeMap<NodeKind, u64>,
    pub edges: BTreeMap<EdgeKind, u64>,
    pub entity_stats: EntityStats,
    pub relationship_stats: RelationshipStats,
    /// Edges rejected at extraction because an endpoint was never extracted
    pub dangling: Vec<DanglingEdge>,
}

impl ExtractionSummary {
    fn from_graph(graph: &ExtractedGraph) -> Self {
        Self {
            nodes: NodeKind::ALL
                .iter()
                .map(|k| (*k, graph.node_count(*k)))
                .collect(),
            edges: EdgeKind::ALL
                .iter()
                .map(|k| (*k, graph.edge_count(*k)))
                .collect(),
            entity_stats: graph.entities.stats.clone(),
            relationship_stats: graph.relationships.stats.clone(),
            dangling: graph.relationships.dangling.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportPaths {
    pub data_quality: Option<PathBuf>,
    pub reconciliation: Option<PathBuf>,
    pub run_summary: Option<PathBuf>,
}

/// Final outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub reference_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub rows_read: u64,
    pub rows_dropped: u64,
    pub extraction: ExtractionSummary,
    pub load: LoadReport,
    pub mismatch_count: usize,
    pub reports: ReportPaths,
    /// No dangling edges, no failed batches, no reconciliation mismatches
    pub success: bool,
    #[serde(skip_serializing)]
    pub quality: QualityReport,
    #[serde(skip_serializing)]
    pub reconciliation: ReconciliationReport,
}

impl RunSummary {
    pub fn dangling_count(&self) -> usize {
        self.extraction.dangling.len() + self.load.dangling.len()
    }
}

/// Opens the store named by the configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn GraphStore>> {
    Ok(match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryGraphStore::new()),
        StoreBackend::Sqlite => Arc::new(SqliteGraphStore::open(&config.path)?),
    })
}

pub struct Pipeline {
    store: Arc<dyn GraphStore>,
    reference_date: NaiveDate,
    loader_config: LoaderConfig,
    reports_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn GraphStore>, reference_date: NaiveDate) -> Self {
        Self {
            store,
            reference_date,
            loader_config: LoaderConfig::default(),
            reports_dir: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(open_store(&config.store)?, config.reference_date()?)
            .with_loader_config(config.loader.clone())
            .with_reports_dir(&config.reports_dir))
    }

    pub fn with_loader_config(mut self, config: LoaderConfig) -> Self {
        self.loader_config = config;
        self
    }

    /// Reports are only written when a directory is set.
    pub fn with_reports_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.reports_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn store(&self) -> Arc<dyn GraphStore> {
        Arc::clone(&self.store)
    }

    /// Reads the four extracts from disk and runs every stage.
    pub async fn run<P: AsRef<Path>>(&self, paths: &SourcePaths<P>) -> Result<RunSummary> {
        info!("Reading source extracts");
        let raw = read_dataset(paths)?;
        self.run_dataset(&raw).await
    }

    #[instrument(skip(self, raw), fields(rows = raw.total_rows()))]
    pub async fn run_dataset(&self, raw: &RawDataset) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let t_pipeline = Instant::now();
        info!(%run_id, reference_date = %self.reference_date, "Starting claims graph run");

        // Step 1: normalize
        let t_normalize = Instant::now();
        let (normalized, quality) = Normalizer::new(self.reference_date).normalize_dataset(raw);
        NormalizeMetrics::record_quality(&quality);
        NormalizeMetrics::record_duration(t_normalize.elapsed().as_secs_f64());
        for (table, tally) in &quality.tables {
            if tally.rows_dropped > 0 {
                warn!(
                    "{}: dropped {} of {} rows for missing keys {:?}",
                    table.as_str(),
                    tally.rows_dropped,
                    tally.rows_read,
                    tally.missing_keys
                );
            }
        }
        info!(
            "Normalized {} providers, {} beneficiaries, {} claims",
            normalized.providers.len(),
            normalized.beneficiaries.len(),
            normalized.claims.len()
        );

        // Step 2: extract
        let graph = extract_graph(&normalized);
        for dangling in &graph.relationships.dangling {
            warn!("Dangling edge rejected at extraction: {}", dangling.edge);
        }
        info!(
            "Extracted {} nodes and {} edges ({} dangling)",
            graph.total_nodes(),
            graph.total_edges(),
            graph.relationships.dangling.len()
        );

        // Step 3: load
        let loader = GraphLoader::with_config(self.store(), self.loader_config.clone());
        let load = loader.load(&graph).await?;

        // Step 4: reconcile
        let reconciliation = Reconciler::new(self.store()).reconcile(&graph).await?;

        let extraction = ExtractionSummary::from_graph(&graph);
        let success = extraction.dangling.is_empty() && load.is_clean() && reconciliation.is_clean();

        let mut summary = RunSummary {
            run_id,
            reference_date: self.reference_date,
            started_at,
            duration_secs: t_pipeline.elapsed().as_secs_f64(),
            rows_read: quality.total_read(),
            rows_dropped: quality.total_dropped(),
            extraction,
            load,
            mismatch_count: reconciliation.mismatches.len(),
            reports: ReportPaths::default(),
            success,
            quality,
            reconciliation,
        };

        // Step 5: reports
        if let Some(dir) = &self.reports_dir {
            summary.reports = self.write_reports(dir, &summary)?;
        }

        if summary.success {
            info!(
                "Run {} succeeded in {:.2}s",
                summary.run_id, summary.duration_secs
            );
        } else {
            error!(
                "Run {} finished with {} dangling edges, {} failed batches, {} mismatches",
                summary.run_id,
                summary.dangling_count(),
                summary.load.batch_failures.len(),
                summary.mismatch_count
            );
        }
        Ok(summary)
    }

    fn write_reports(&self, dir: &Path, summary: &RunSummary) -> Result<ReportPaths> {
        fs::create_dir_all(dir)?;
        let mut paths = ReportPaths {
            data_quality: Some(write_json(
                dir,
                &format!("data_quality_{}.json", summary.run_id),
                &summary.quality,
            )?),
            reconciliation: Some(write_json(
                dir,
                &format!("reconciliation_{}.json", summary.run_id),
                &summary.reconciliation,
            )?),
            run_summary: None,
        };
        let summary_path = dir.join(format!("run_summary_{}.json", summary.run_id));
        paths.run_summary = Some(summary_path.clone());

        let mut written = summary.clone();
        written.reports = paths.clone();
        fs::write(&summary_path, serde_json::to_string_pretty(&written)?)?;
        info!("Reports written to {}", dir.display());
        Ok(paths)
    }
}

fn write_json<T: Serialize>(dir: &Path, filename: &str, value: &T) -> Result<PathBuf> {
    let filepath = dir.join(filename);
    fs::write(&filepath, serde_json::to_string_pretty(value)?)?;
    Ok(filepath)
}

/// Runs the whole pipeline once as configured.
pub async fn run_pipeline(config: &Config) -> Result<RunSummary> {
    let pipeline = Pipeline::from_config(config)?;
    pipeline.run(&config.input.source_paths()).await
}
