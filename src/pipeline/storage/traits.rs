use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::StoreResult;
use crate::domain::{EdgeKind, EdgeRecord, NodeKey, NodeKind, NodeRecord};

/// Result of one node batch. Existing keys are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBatchOutcome {
    pub inserted: u64,
    pub already_present: u64,
}

/// Result of one edge batch. Edges whose endpoints are absent fail alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeBatchOutcome {
    pub inserted: u64,
    pub already_present: u64,
    pub rejected: Vec<(EdgeRecord, Vec<NodeKey>)>,
}

/// How many FILED and HAS_CLAIM edges point at one stored claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAttachment {
    pub claim_id: String,
    pub filed: u64,
    pub has_claim: u64,
}

impl ClaimAttachment {
    pub fn is_orphan(&self) -> bool {
        self.filed != 1 || self.has_claim != 1
    }
}

/// An edge identity tuple stored more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEdge {
    pub edge: EdgeRecord,
    pub occurrences: u64,
}

/// Cost attributes of one stored claim plus the fraud flag of its filer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredClaimCost {
    pub claim_id: String,
    pub total_cost: f64,
    pub reimbursed_amount: f64,
    pub deductible_amount: f64,
    /// `None` when no FILED edge reaches the claim
    pub provider_fraud: Option<bool>,
}

/// Storage boundary for the claims graph.
///
/// Upserts must be idempotent: writing a record whose key (or edge identity
/// tuple) already exists leaves the stored record unchanged. Each call to
/// `upsert_nodes`/`upsert_edges` is one atomic batch.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn health_check(&self) -> StoreResult<()>;

    /// Creates uniqueness constraints; safe to call on a populated store.
    async fn ensure_schema(&self) -> StoreResult<()>;

    async fn upsert_nodes(&self, kind: NodeKind, batch: &[NodeRecord])
        -> StoreResult<NodeBatchOutcome>;

    async fn upsert_edges(&self, kind: EdgeKind, batch: &[EdgeRecord])
        -> StoreResult<EdgeBatchOutcome>;

    async fn count_nodes(&self, kind: NodeKind) -> StoreResult<u64>;

    async fn count_edges(&self, kind: EdgeKind) -> StoreResult<u64>;

    async fn claim_attachments(&self) -> StoreResult<Vec<ClaimAttachment>>;

    async fn duplicate_edge_tuples(&self) -> StoreResult<Vec<DuplicateEdge>>;

    async fn claim_costs(&self) -> StoreResult<Vec<StoredClaimCost>>;
}
