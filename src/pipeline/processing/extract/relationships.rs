use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::dedup::DedupIndex;
use super::unpivot;
use crate::domain::*;
use crate::pipeline::processing::normalize::ClaimRow;
use crate::pipeline::processing::schema::{CODE_COLUMNS, PHYSICIAN_COLUMNS};

/// Where a dangling edge was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingStage {
    /// Endpoint never extracted as a node
    Extraction,
    /// Endpoint absent from the store when the edge was written
    Load,
}

/// An edge rejected because one of its endpoints does not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanglingEdge {
    pub edge: EdgeRecord,
    pub missing: Vec<NodeKey>,
    pub stage: DanglingStage,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRelationships {
    pub edges: BTreeMap<EdgeKind, Vec<EdgeRecord>>,
    pub dangling: Vec<DanglingEdge>,
    pub stats: RelationshipStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipStats {
    /// Identical edges from one claim collapsed into one (e.g. a code repeated across slots)
    pub collapsed_duplicates: BTreeMap<EdgeKind, u64>,
    /// Claim rows skipped because their claim id was already processed
    pub repeated_claim_rows: u64,
}

impl ExtractedRelationships {
    pub fn edges(&self, kind: EdgeKind) -> &[EdgeRecord] {
        self.edges.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, kind: EdgeKind) -> u64 {
        self.edges(kind).len() as u64
    }
}

/// Turns normalized claim rows into edge records, validating every endpoint
/// against the keys the entity extractor produced.
pub struct RelationshipExtractor<'a> {
    known: &'a HashSet<NodeKey>,
    claims_seen: DedupIndex<String>,
    edges_seen: DedupIndex<EdgeRecord>,
    out: ExtractedRelationships,
}

impl<'a> RelationshipExtractor<'a> {
    pub fn new(known: &'a HashSet<NodeKey>) -> Self {
        Self {
            known,
            claims_seen: DedupIndex::new(),
            edges_seen: DedupIndex::new(),
            out: ExtractedRelationships::default(),
        }
    }

    pub fn extract(mut self, claims: &[ClaimRow]) -> ExtractedRelationships {
        for claim in claims {
            if !self.claims_seen.first_sighting(claim.claim_id.clone()) {
                self.out.stats.repeated_claim_rows += 1;
                continue;
            }
            for edge in claim_edges(claim) {
                self.push(edge);
            }
        }
        self.out
    }

    fn push(&mut self, edge: EdgeRecord) {
        let missing: Vec<NodeKey> = [&edge.source, &edge.target]
            .into_iter()
            .filter(|key| !self.known.contains(*key))
            .cloned()
            .collect();

        if !missing.is_empty() {
            self.out.dangling.push(DanglingEdge {
                edge,
                missing,
                stage: DanglingStage::Extraction,
            });
            return;
        }

        let kind = edge.kind;
        if self.edges_seen.first_sighting(edge.clone()) {
            self.out.edges.entry(kind).or_default().push(edge);
        } else {
            *self.out.stats.collapsed_duplicates.entry(kind).or_insert(0) += 1;
        }
    }
}

/// All edges one claim row yields: FILED and HAS_CLAIM unconditionally, then
/// one ATTENDED_BY per non-null role column and one INCLUDES_CODE per non-null slot.
pub fn claim_edges(claim: &ClaimRow) -> Vec<EdgeRecord> {
    let mut edges = vec![
        EdgeRecord::filed(&claim.provider_id, &claim.claim_id),
        EdgeRecord::has_claim(&claim.beneficiary_id, &claim.claim_id),
    ];
    edges.extend(
        unpivot(claim, PHYSICIAN_COLUMNS)
            .map(|(role, physician)| EdgeRecord::attended_by(&claim.claim_id, physician, role)),
    );
    edges.extend(
        unpivot(claim, CODE_COLUMNS)
            .map(|(code_kind, code)| EdgeRecord::includes_code(&claim.claim_id, code, code_kind)),
    );
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::extract::tests::claim_row;

    fn known_for(claim: &ClaimRow) -> HashSet<NodeKey> {
        let mut known: HashSet<NodeKey> = claim_edges(claim)
            .into_iter()
            .flat_map(|e| [e.source, e.target])
            .collect();
        known.insert(NodeKey::claim(&claim.claim_id));
        known
    }

    #[test]
    fn test_two_physicians_yield_two_attended_by_edges() {
        let mut claim = claim_row("CLM1", "PRV1", "BENE1");
        claim.slots.insert("AttendingPhysician".into(), "PHY1".into());
        claim.slots.insert("OperatingPhysician".into(), "PHY2".into());

        let known = known_for(&claim);
        let rels = RelationshipExtractor::new(&known).extract(&[claim]);

        let attended = rels.edges(EdgeKind::AttendedBy);
        assert_eq!(attended.len(), 2);
        let roles: HashSet<PhysicianRole> = attended.iter().filter_map(|e| e.role).collect();
        assert_eq!(
            roles,
            HashSet::from([PhysicianRole::Attending, PhysicianRole::Operating])
        );
        assert_eq!(rels.count(EdgeKind::Filed), 1);
        assert_eq!(rels.count(EdgeKind::HasClaim), 1);
    }

    #[test]
    fn test_claim_without_physicians_yields_no_attended_by() {
        let claim = claim_row("CLM1", "PRV1", "BENE1");
        let known = known_for(&claim);
        let rels = RelationshipExtractor::new(&known).extract(&[claim]);

        assert_eq!(rels.count(EdgeKind::AttendedBy), 0);
        assert_eq!(rels.count(EdgeKind::IncludesCode), 0);
    }

    #[test]
    fn test_codes_are_tagged_with_their_namespace() {
        let mut claim = claim_row("CLM1", "PRV1", "BENE1");
        claim.slots.insert("ClmDiagnosisCode_1".into(), "4019".into());
        claim.slots.insert("ClmDiagnosisCode_3".into(), "2724".into());
        claim.slots.insert("ClmProcedureCode_1".into(), "4019".into());

        let known = known_for(&claim);
        let rels = RelationshipExtractor::new(&known).extract(&[claim]);

        let includes = rels.edges(EdgeKind::IncludesCode);
        assert_eq!(includes.len(), 3);
        assert!(includes.contains(&EdgeRecord::includes_code(
            "CLM1",
            "4019",
            CodeKind::Procedure
        )));
    }

    #[test]
    fn test_repeated_code_collapses_to_one_edge() {
        let mut claim = claim_row("CLM1", "PRV1", "BENE1");
        claim.slots.insert("ClmDiagnosisCode_1".into(), "4019".into());
        claim.slots.insert("ClmDiagnosisCode_2".into(), "4019".into());

        let known = known_for(&claim);
        let rels = RelationshipExtractor::new(&known).extract(&[claim]);

        assert_eq!(rels.count(EdgeKind::IncludesCode), 1);
        assert_eq!(rels.stats.collapsed_duplicates[&EdgeKind::IncludesCode], 1);
    }

    #[test]
    fn test_unknown_provider_is_rejected_as_dangling() {
        let claim = claim_row("CLM1", "PRV_MISSING", "BENE1");
        let known: HashSet<NodeKey> = [NodeKey::claim("CLM1"), NodeKey::beneficiary("BENE1")]
            .into_iter()
            .collect();

        let rels = RelationshipExtractor::new(&known).extract(&[claim]);
        assert_eq!(rels.count(EdgeKind::Filed), 0);
        assert_eq!(rels.count(EdgeKind::HasClaim), 1);
        assert_eq!(rels.dangling.len(), 1);
        assert_eq!(
            rels.dangling[0].missing,
            vec![NodeKey::provider("PRV_MISSING")]
        );
        assert_eq!(rels.dangling[0].stage, DanglingStage::Extraction);
    }
}
