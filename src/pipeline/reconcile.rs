//! Reconciler: post-load comparison of the store against extracted records.
//!
//! Every failed check becomes a [`ReconciliationMismatch`]; nothing is repaired.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::constants::COST_TOLERANCE;
use crate::domain::{EdgeKind, NodeKey, NodeKind, NodeRecord};
use crate::error::Result;
use crate::metrics::ReconcileMetrics;
use crate::pipeline::processing::extract::ExtractedGraph;
use crate::pipeline::storage::GraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    NodeCount,
    EdgeCount,
    OrphanClaim,
    DuplicateEdge,
    CostByFraudFlag,
    CostConsistency,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MismatchValue {
    Count(u64),
    Amount(f64),
}

impl fmt::Display for MismatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchValue::Count(n) => write!(f, "{}", n),
            MismatchValue::Amount(x) => write!(f, "{:.2}", x),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationMismatch {
    pub kind: MismatchKind,
    pub subject: String,
    pub expected: MismatchValue,
    pub actual: MismatchValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CountCheck {
    pub expected: u64,
    pub actual: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostCheck {
    pub expected: f64,
    pub actual: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub checks_run: usize,
    pub node_counts: BTreeMap<NodeKind, CountCheck>,
    pub edge_counts: BTreeMap<EdgeKind, CountCheck>,
    /// Claim cost totals keyed by the filing provider's fraud flag
    pub cost_by_fraud_flag: BTreeMap<String, CostCheck>,
    pub mismatches: Vec<ReconciliationMismatch>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn mismatches_of(&self, kind: MismatchKind) -> Vec<&ReconciliationMismatch> {
        self.mismatches.iter().filter(|m| m.kind == kind).collect()
    }

    fn check(&mut self, passed: bool, mismatch: impl FnOnce() -> ReconciliationMismatch) {
        self.checks_run += 1;
        if !passed {
            self.mismatches.push(mismatch());
        }
    }
}

fn fraud_group(fraud: bool) -> &'static str {
    if fraud {
        "fraud"
    } else {
        "not_fraud"
    }
}

/// Absolute tolerance, widened for large sums so summation order never trips it.
fn amounts_match(expected: f64, actual: f64) -> bool {
    (expected - actual).abs() <= COST_TOLERANCE.max(expected.abs() * 1e-9)
}

pub struct Reconciler {
    store: Arc<dyn GraphStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self, graph: &ExtractedGraph) -> Result<ReconciliationReport> {
        let started = Instant::now();
        let mut report = ReconciliationReport::default();

        self.check_node_counts(graph, &mut report).await?;
        self.check_edge_counts(graph, &mut report).await?;
        self.check_orphan_claims(&mut report).await?;
        self.check_duplicate_edges(&mut report).await?;
        self.check_costs(graph, &mut report).await?;

        for mismatch in &report.mismatches {
            warn!(
                "Reconciliation mismatch [{:?}] {}: expected {}, found {}",
                mismatch.kind, mismatch.subject, mismatch.expected, mismatch.actual
            );
        }
        info!(
            "Reconciliation ran {} checks, {} mismatches",
            report.checks_run,
            report.mismatches.len()
        );
        ReconcileMetrics::record_run(
            report.checks_run,
            report.mismatches.len(),
            started.elapsed().as_secs_f64(),
        );
        Ok(report)
    }

    async fn check_node_counts(
        &self,
        graph: &ExtractedGraph,
        report: &mut ReconciliationReport,
    ) -> Result<()> {
        for kind in NodeKind::ALL {
            let check = CountCheck {
                expected: graph.node_count(kind),
                actual: self.store.count_nodes(kind).await?,
            };
            report.node_counts.insert(kind, check);
            report.check(check.expected == check.actual, || ReconciliationMismatch {
                kind: MismatchKind::NodeCount,
                subject: kind.label().to_string(),
                expected: MismatchValue::Count(check.expected),
                actual: MismatchValue::Count(check.actual),
            });
        }
        Ok(())
    }

    async fn check_edge_counts(
        &self,
        graph: &ExtractedGraph,
        report: &mut ReconciliationReport,
    ) -> Result<()> {
        for kind in EdgeKind::ALL {
            let check = CountCheck {
                expected: graph.edge_count(kind),
                actual: self.store.count_edges(kind).await?,
            };
            report.edge_counts.insert(kind, check);
            report.check(check.expected == check.actual, || ReconciliationMismatch {
                kind: MismatchKind::EdgeCount,
                subject: kind.label().to_string(),
                expected: MismatchValue::Count(check.expected),
                actual: MismatchValue::Count(check.actual),
            });
        }
        Ok(())
    }

    /// One mismatch per (claim, relationship) whose edge count is not exactly one.
    async fn check_orphan_claims(&self, report: &mut ReconciliationReport) -> Result<()> {
        for attachment in self.store.claim_attachments().await? {
            for (kind, count) in [
                (EdgeKind::Filed, attachment.filed),
                (EdgeKind::HasClaim, attachment.has_claim),
            ] {
                report.check(count == 1, || ReconciliationMismatch {
                    kind: MismatchKind::OrphanClaim,
                    subject: format!("{} {}", attachment.claim_id, kind),
                    expected: MismatchValue::Count(1),
                    actual: MismatchValue::Count(count),
                });
            }
        }
        Ok(())
    }

    async fn check_duplicate_edges(&self, report: &mut ReconciliationReport) -> Result<()> {
        let duplicates = self.store.duplicate_edge_tuples().await?;
        report.checks_run += 1;
        report
            .mismatches
            .extend(duplicates.into_iter().map(|dup| ReconciliationMismatch {
                kind: MismatchKind::DuplicateEdge,
                subject: dup.edge.to_string(),
                expected: MismatchValue::Count(1),
                actual: MismatchValue::Count(dup.occurrences),
            }));
        Ok(())
    }

    async fn check_costs(
        &self,
        graph: &ExtractedGraph,
        report: &mut ReconciliationReport,
    ) -> Result<()> {
        let expected = expected_cost_by_fraud_flag(graph);
        let stored = self.store.claim_costs().await?;

        let mut actual: BTreeMap<bool, f64> = BTreeMap::new();
        for claim in &stored {
            if let Some(fraud) = claim.provider_fraud {
                *actual.entry(fraud).or_insert(0.0) += claim.total_cost;
            }

            let recomputed = claim.reimbursed_amount + claim.deductible_amount;
            report.check(
                (claim.total_cost - recomputed).abs() <= COST_TOLERANCE,
                || ReconciliationMismatch {
                    kind: MismatchKind::CostConsistency,
                    subject: claim.claim_id.clone(),
                    expected: MismatchValue::Amount(recomputed),
                    actual: MismatchValue::Amount(claim.total_cost),
                },
            );
        }

        for fraud in [true, false] {
            let check = CostCheck {
                expected: expected.get(&fraud).copied().unwrap_or(0.0),
                actual: actual.get(&fraud).copied().unwrap_or(0.0),
            };
            report.cost_by_fraud_flag.insert(fraud_group(fraud).to_string(), check);
            report.check(amounts_match(check.expected, check.actual), || {
                ReconciliationMismatch {
                    kind: MismatchKind::CostByFraudFlag,
                    subject: fraud_group(fraud).to_string(),
                    expected: MismatchValue::Amount(check.expected),
                    actual: MismatchValue::Amount(check.actual),
                }
            });
        }
        Ok(())
    }
}

/// Total claim cost per filing provider's fraud flag, over extracted FILED edges.
pub fn expected_cost_by_fraud_flag(graph: &ExtractedGraph) -> BTreeMap<bool, f64> {
    let fraud_by_provider: HashMap<NodeKey, bool> = graph
        .entities
        .nodes(NodeKind::Provider)
        .iter()
        .filter_map(|record| match record {
            NodeRecord::Provider(p) => Some((record.key(), p.fraud_flag)),
            _ => None,
        })
        .collect();
    let cost_by_claim: HashMap<NodeKey, f64> = graph
        .entities
        .nodes(NodeKind::Claim)
        .iter()
        .filter_map(|record| match record {
            NodeRecord::Claim(c) => Some((record.key(), c.total_cost)),
            _ => None,
        })
        .collect();

    let mut totals = BTreeMap::new();
    for edge in graph.relationships.edges(EdgeKind::Filed) {
        if let (Some(fraud), Some(cost)) = (
            fraud_by_provider.get(&edge.source),
            cost_by_claim.get(&edge.target),
        ) {
            *totals.entry(*fraud).or_insert(0.0) += cost;
        }
    }
    totals
}
