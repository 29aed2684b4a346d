//! Graph Loader: batched, idempotent writes of extracted records.
//!
//! Node kinds load in a fixed order, then edge kinds, so every endpoint an
//! edge batch needs is already committed. A failed batch is retried with its
//! contents unchanged and, once retries are exhausted, recorded and skipped.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF_MS};
use crate::domain::{EdgeKind, EdgeRecord, NodeKind, NodeRecord};
use crate::error::{PipelineError, Result};
use crate::metrics::LoaderMetrics;
use crate::pipeline::processing::extract::{DanglingEdge, DanglingStage, ExtractedGraph};
use crate::pipeline::storage::{
    EdgeBatchOutcome, GraphStore, NodeBatchOutcome, StoreError, StoreResult,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Records per batch
    pub batch_size: usize,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Backoff before retry n is `n * retry_backoff_ms`
    pub retry_backoff_ms: u64,
    /// Batches of one kind allowed in flight at once
    pub max_in_flight: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            max_in_flight: 1,
        }
    }
}

/// The record kind a batch carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum BatchTarget {
    Nodes(NodeKind),
    Edges(EdgeKind),
}

impl BatchTarget {
    fn label(&self) -> &'static str {
        match self {
            BatchTarget::Nodes(kind) => kind.label(),
            BatchTarget::Edges(kind) => kind.label(),
        }
    }
}

impl fmt::Display for BatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchTarget::Nodes(kind) => write!(f, "{} nodes", kind),
            BatchTarget::Edges(kind) => write!(f, "{} edges", kind),
        }
    }
}

/// A batch abandoned after exhausting its retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchWriteFailure {
    pub target: BatchTarget,
    /// 0-based position of the batch within its kind
    pub batch_index: usize,
    pub attempts: u32,
    pub error: String,
    /// Keys (nodes) or rendered identity tuples (edges) of every record in the batch
    pub records: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub nodes_inserted: BTreeMap<NodeKind, u64>,
    pub edges_inserted: BTreeMap<EdgeKind, u64>,
    pub nodes_already_present: BTreeMap<NodeKind, u64>,
    pub edges_already_present: BTreeMap<EdgeKind, u64>,
    pub batches_written: u64,
    pub retries: u64,
    pub dangling: Vec<DanglingEdge>,
    pub batch_failures: Vec<BatchWriteFailure>,
}

impl LoadReport {
    pub fn total_inserted(&self) -> u64 {
        self.nodes_inserted.values().sum::<u64>() + self.edges_inserted.values().sum::<u64>()
    }

    pub fn total_already_present(&self) -> u64 {
        self.nodes_already_present.values().sum::<u64>()
            + self.edges_already_present.values().sum::<u64>()
    }

    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.batch_failures.is_empty()
    }
}

pub struct GraphLoader {
    store: Arc<dyn GraphStore>,
    config: LoaderConfig,
}

impl GraphLoader {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_config(store, LoaderConfig::default())
    }

    pub fn with_config(store: Arc<dyn GraphStore>, config: LoaderConfig) -> Self {
        Self { store, config }
    }

    /// Loads every extracted node and edge.
    ///
    /// Fails only when the store is unreachable or its schema cannot be set
    /// up; batch-level problems are collected into the returned report.
    pub async fn load(&self, graph: &ExtractedGraph) -> Result<LoadReport> {
        self.store.health_check().await.map_err(|e| {
            error!("Graph store health check failed: {}", e);
            PipelineError::StoreUnavailable(e.to_string())
        })?;
        self.store.ensure_schema().await?;

        let mut report = LoadReport::default();

        for kind in NodeKind::ALL {
            self.load_nodes(kind, graph.entities.nodes(kind), &mut report)
                .await;
        }
        for kind in EdgeKind::ALL {
            self.load_edges(kind, graph.relationships.edges(kind), &mut report)
                .await;
        }

        if !report.dangling.is_empty() {
            LoaderMetrics::record_dangling_edges(report.dangling.len());
        }
        info!(
            "Load finished: {} inserted, {} already present, {} batch failures, {} dangling edges",
            report.total_inserted(),
            report.total_already_present(),
            report.batch_failures.len(),
            report.dangling.len()
        );
        Ok(report)
    }

    async fn load_nodes(&self, kind: NodeKind, records: &[NodeRecord], report: &mut LoadReport) {
        let target = BatchTarget::Nodes(kind);
        info!("Loading {} {} nodes", records.len(), kind);

        let results = self
            .write_batches(target, records, |batch| self.store.upsert_nodes(kind, batch))
            .await;

        for (index, batch, result) in results {
            match result {
                Ok((outcome, retries)) => {
                    let NodeBatchOutcome {
                        inserted,
                        already_present,
                    } = outcome;
                    *report.nodes_inserted.entry(kind).or_insert(0) += inserted;
                    *report.nodes_already_present.entry(kind).or_insert(0) += already_present;
                    report.batches_written += 1;
                    report.retries += retries as u64;
                }
                Err(failure) => {
                    report.retries += failure.attempts.saturating_sub(1) as u64;
                    report.batch_failures.push(BatchWriteFailure {
                        records: batch.iter().map(|r| r.key().to_string()).collect(),
                        batch_index: index,
                        ..failure
                    });
                }
            }
        }
    }

    async fn load_edges(&self, kind: EdgeKind, records: &[EdgeRecord], report: &mut LoadReport) {
        let target = BatchTarget::Edges(kind);
        info!("Loading {} {} edges", records.len(), kind);

        let results = self
            .write_batches(target, records, |batch| self.store.upsert_edges(kind, batch))
            .await;

        for (index, batch, result) in results {
            match result {
                Ok((outcome, retries)) => {
                    let EdgeBatchOutcome {
                        inserted,
                        already_present,
                        rejected,
                    } = outcome;
                    *report.edges_inserted.entry(kind).or_insert(0) += inserted;
                    *report.edges_already_present.entry(kind).or_insert(0) += already_present;
                    report.batches_written += 1;
                    report.retries += retries as u64;
                    for (edge, missing) in rejected {
                        warn!("Dangling {} edge rejected by store: {}", kind, edge);
                        report.dangling.push(DanglingEdge {
                            edge,
                            missing,
                            stage: DanglingStage::Load,
                        });
                    }
                }
                Err(failure) => {
                    report.retries += failure.attempts.saturating_sub(1) as u64;
                    report.batch_failures.push(BatchWriteFailure {
                        records: batch.iter().map(|e| e.to_string()).collect(),
                        batch_index: index,
                        ..failure
                    });
                }
            }
        }
    }

    /// Chunks `records` and writes the chunks with at most `max_in_flight`
    /// outstanding, returning per-batch results in batch order.
    async fn write_batches<'a, R, T, F, Fut>(
        &self,
        target: BatchTarget,
        records: &'a [R],
        write: F,
    ) -> Vec<(usize, &'a [R], std::result::Result<(T, u32), BatchWriteFailure>)>
    where
        F: Fn(&'a [R]) -> Fut + Copy,
        Fut: Future<Output = StoreResult<T>>,
    {
        let batch_size = self.config.batch_size.max(1);
        let in_flight = self.config.max_in_flight.max(1);

        let mut results: Vec<_> = stream::iter(records.chunks(batch_size).enumerate())
            .map(|(index, batch)| async move {
                let result = self
                    .write_with_retry(target, index, batch.len(), || write(batch))
                    .await;
                (index, batch, result)
            })
            .buffer_unordered(in_flight)
            .collect()
            .await;

        results.sort_by_key(|(index, _, _)| *index);
        results
    }

    /// Attempts one batch up to `1 + max_retries` times with linear backoff.
    /// On success returns the outcome and the number of retries it took.
    async fn write_with_retry<T, F, Fut>(
        &self,
        target: BatchTarget,
        index: usize,
        size: usize,
        attempt: F,
    ) -> std::result::Result<(T, u32), BatchWriteFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let max_attempts = self.config.max_retries + 1;
        let started = Instant::now();
        let mut last_error: Option<StoreError> = None;

        for n in 1..=max_attempts {
            match attempt().await {
                Ok(outcome) => {
                    debug!("{} batch {} committed on attempt {}", target, index, n);
                    LoaderMetrics::record_batch_written(
                        target.label(),
                        size,
                        started.elapsed().as_secs_f64(),
                    );
                    return Ok((outcome, n - 1));
                }
                Err(e) => {
                    if n < max_attempts {
                        let backoff = self.config.retry_backoff_ms * n as u64;
                        warn!(
                            "{} batch {} failed (attempt {}/{}): {}; retrying in {}ms",
                            target, index, n, max_attempts, e, backoff
                        );
                        LoaderMetrics::record_batch_retry(target.label());
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        error!(
            "{} batch {} abandoned after {} attempts: {}",
            target, index, max_attempts, error
        );
        LoaderMetrics::record_batch_failure(target.label());
        Err(BatchWriteFailure {
            target,
            batch_index: index,
            attempts: max_attempts,
            error,
            records: Vec::new(),
        })
    }
}
