//! Entity and relationship extraction from normalized rows.

pub mod dedup;
pub mod entities;
pub mod relationships;

use crate::domain::{EdgeKind, NodeKind};
use crate::pipeline::processing::normalize::{ClaimRow, NormalizedDataset};
use crate::pipeline::processing::schema::UnpivotColumn;

pub use entities::{EntityExtractor, EntityStats, ExtractedEntities};
pub use relationships::{
    DanglingEdge, DanglingStage, ExtractedRelationships, RelationshipExtractor, RelationshipStats,
};

/// Yields `(tag, value)` for every non-null column of `columns` on the claim.
pub fn unpivot<'a, T: Copy>(
    row: &'a ClaimRow,
    columns: &'a [UnpivotColumn<T>],
) -> impl Iterator<Item = (T, &'a str)> + 'a {
    columns
        .iter()
        .filter_map(move |col| row.slot(col.column).map(|value| (col.tag, value)))
}

/// Everything extraction produced for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedGraph {
    pub entities: ExtractedEntities,
    pub relationships: ExtractedRelationships,
}

impl ExtractedGraph {
    pub fn node_count(&self, kind: NodeKind) -> u64 {
        self.entities.count(kind)
    }

    pub fn edge_count(&self, kind: EdgeKind) -> u64 {
        self.relationships.count(kind)
    }

    pub fn total_nodes(&self) -> u64 {
        NodeKind::ALL.iter().map(|k| self.node_count(*k)).sum()
    }

    pub fn total_edges(&self) -> u64 {
        EdgeKind::ALL.iter().map(|k| self.edge_count(*k)).sum()
    }
}

/// Runs entity extraction, then relationship extraction against the
/// extracted key set.
pub fn extract_graph(data: &NormalizedDataset) -> ExtractedGraph {
    let entities = EntityExtractor::new().extract(data);
    let known = entities.key_set();
    let relationships = RelationshipExtractor::new(&known).extract(&data.claims);
    ExtractedGraph {
        entities,
        relationships,
    }
}
