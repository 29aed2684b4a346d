use super::traits::*;
use super::{StoreError, StoreResult};
use crate::domain::*;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Which batches an injected fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultTarget {
    Nodes(NodeKind),
    Edges(EdgeKind),
}

/// In-memory graph store for tests and dry runs.
///
/// Supports fault injection (fail the next N write attempts for a kind) and
/// an unconstrained mode that accepts duplicate edges, so reconciliation
/// checks can be exercised against a misbehaving store.
pub struct InMemoryGraphStore {
    nodes: Arc<Mutex<HashMap<NodeKey, NodeRecord>>>,
    edges: Arc<Mutex<Vec<EdgeRecord>>>,
    edge_index: Arc<Mutex<HashSet<EdgeRecord>>>,
    faults: Arc<Mutex<HashMap<FaultTarget, usize>>>,
    write_attempts: Arc<AtomicUsize>,
    reachable: bool,
    enforce_edge_uniqueness: bool,
    schema_ready: AtomicBool,
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(Mutex::new(HashMap::new())),
            edges: Arc::new(Mutex::new(Vec::new())),
            edge_index: Arc::new(Mutex::new(HashSet::new())),
            faults: Arc::new(Mutex::new(HashMap::new())),
            write_attempts: Arc::new(AtomicUsize::new(0)),
            reachable: true,
            enforce_edge_uniqueness: true,
            schema_ready: AtomicBool::new(false),
        }
    }

    /// A store whose health check always fails.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// A store that appends every edge it is given, duplicates included.
    pub fn without_edge_constraints() -> Self {
        Self {
            enforce_edge_uniqueness: false,
            ..Self::new()
        }
    }

    /// Makes the next `attempts` write attempts against `target` fail.
    pub fn fail_next(&self, target: FaultTarget, attempts: usize) {
        self.faults.lock().unwrap().insert(target, attempts);
    }

    /// Total number of upsert calls received, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn schema_ready(&self) -> bool {
        self.schema_ready.load(Ordering::SeqCst)
    }

    pub fn get_node(&self, key: &NodeKey) -> Option<NodeRecord> {
        self.nodes.lock().unwrap().get(key).cloned()
    }

    pub fn contains_edge(&self, edge: &EdgeRecord) -> bool {
        self.edges.lock().unwrap().contains(edge)
    }

    fn check_fault(&self, target: FaultTarget) -> StoreResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let mut faults = self.faults.lock().unwrap();
        if let Some(remaining) = faults.get_mut(&target) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Write(format!(
                    "injected fault for {:?} ({} more queued)",
                    target, remaining
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn health_check(&self) -> StoreResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "in-memory store configured as unreachable".to_string(),
            ))
        }
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.schema_ready.store(true, Ordering::SeqCst);
        debug!(
            "In-memory schema ready (edge uniqueness enforced: {})",
            self.enforce_edge_uniqueness
        );
        Ok(())
    }

    async fn upsert_nodes(
        &self,
        kind: NodeKind,
        batch: &[NodeRecord],
    ) -> StoreResult<NodeBatchOutcome> {
        self.check_fault(FaultTarget::Nodes(kind))?;

        // One lock for the whole batch keeps it atomic
        let mut nodes = self.nodes.lock().unwrap();
        let mut outcome = NodeBatchOutcome::default();
        for record in batch {
            let key = record.key();
            if nodes.contains_key(&key) {
                outcome.already_present += 1;
            } else {
                nodes.insert(key, record.clone());
                outcome.inserted += 1;
            }
        }

        debug!(
            "Upserted {} {} nodes ({} already present)",
            outcome.inserted, kind, outcome.already_present
        );
        Ok(outcome)
    }

    async fn upsert_edges(
        &self,
        kind: EdgeKind,
        batch: &[EdgeRecord],
    ) -> StoreResult<EdgeBatchOutcome> {
        self.check_fault(FaultTarget::Edges(kind))?;

        let nodes = self.nodes.lock().unwrap();
        let mut edges = self.edges.lock().unwrap();
        let mut index = self.edge_index.lock().unwrap();
        let mut outcome = EdgeBatchOutcome::default();

        for edge in batch {
            let missing: Vec<NodeKey> = [&edge.source, &edge.target]
                .into_iter()
                .filter(|key| !nodes.contains_key(*key))
                .cloned()
                .collect();
            if !missing.is_empty() {
                outcome.rejected.push((edge.clone(), missing));
                continue;
            }

            if self.enforce_edge_uniqueness && index.contains(edge) {
                outcome.already_present += 1;
                continue;
            }
            index.insert(edge.clone());
            edges.push(edge.clone());
            outcome.inserted += 1;
        }

        debug!(
            "Upserted {} {} edges ({} already present, {} rejected)",
            outcome.inserted,
            kind,
            outcome.already_present,
            outcome.rejected.len()
        );
        Ok(outcome)
    }

    async fn count_nodes(&self, kind: NodeKind) -> StoreResult<u64> {
        let nodes = self.nodes.lock().unwrap();
        Ok(nodes.keys().filter(|k| k.kind() == kind).count() as u64)
    }

    async fn count_edges(&self, kind: EdgeKind) -> StoreResult<u64> {
        let edges = self.edges.lock().unwrap();
        Ok(edges.iter().filter(|e| e.kind == kind).count() as u64)
    }

    async fn claim_attachments(&self) -> StoreResult<Vec<ClaimAttachment>> {
        let nodes = self.nodes.lock().unwrap();
        let edges = self.edges.lock().unwrap();

        let mut attachments: BTreeMap<String, ClaimAttachment> = nodes
            .keys()
            .filter_map(|key| match key {
                NodeKey::Claim { id } => Some((
                    id.clone(),
                    ClaimAttachment {
                        claim_id: id.clone(),
                        filed: 0,
                        has_claim: 0,
                    },
                )),
                _ => None,
            })
            .collect();

        for edge in edges.iter() {
            let NodeKey::Claim { id } = &edge.target else {
                continue;
            };
            if let Some(entry) = attachments.get_mut(id) {
                match edge.kind {
                    EdgeKind::Filed => entry.filed += 1,
                    EdgeKind::HasClaim => entry.has_claim += 1,
                    _ => {}
                }
            }
        }

        Ok(attachments.into_values().collect())
    }

    async fn duplicate_edge_tuples(&self) -> StoreResult<Vec<DuplicateEdge>> {
        let edges = self.edges.lock().unwrap();
        let mut occurrences: BTreeMap<&EdgeRecord, u64> = BTreeMap::new();
        for edge in edges.iter() {
            *occurrences.entry(edge).or_insert(0) += 1;
        }
        Ok(occurrences
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(edge, n)| DuplicateEdge {
                edge: edge.clone(),
                occurrences: n,
            })
            .collect())
    }

    async fn claim_costs(&self) -> StoreResult<Vec<StoredClaimCost>> {
        let nodes = self.nodes.lock().unwrap();
        let edges = self.edges.lock().unwrap();

        let filer_fraud: HashMap<&NodeKey, bool> = edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Filed)
            .filter_map(|e| match nodes.get(&e.source) {
                Some(NodeRecord::Provider(p)) => Some((&e.target, p.fraud_flag)),
                _ => None,
            })
            .collect();

        let mut costs: Vec<StoredClaimCost> = nodes
            .iter()
            .filter_map(|(key, record)| match record {
                NodeRecord::Claim(c) => Some(StoredClaimCost {
                    claim_id: c.claim_id.clone(),
                    total_cost: c.total_cost,
                    reimbursed_amount: c.reimbursed_amount,
                    deductible_amount: c.deductible_amount,
                    provider_fraud: filer_fraud.get(key).copied(),
                }),
                _ => None,
            })
            .collect();
        costs.sort_by(|a, b| a.claim_id.cmp(&b.claim_id));
        Ok(costs)
    }
}
