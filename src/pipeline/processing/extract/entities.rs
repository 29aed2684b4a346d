use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::dedup::DedupIndex;
use super::unpivot;
use crate::domain::*;
use crate::pipeline::processing::normalize::{BeneficiaryRow, ClaimRow, NormalizedDataset};
use crate::pipeline::processing::schema::{CODE_COLUMNS, PHYSICIAN_COLUMNS};

/// Deduplicated node records per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedEntities {
    pub nodes: BTreeMap<NodeKind, Vec<NodeRecord>>,
    pub stats: EntityStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    /// Source rows whose key had already been emitted (first sighting wins)
    pub duplicate_rows: BTreeMap<NodeKind, u64>,
    /// Column references scanned for identity-only kinds (physicians, codes)
    pub references_scanned: BTreeMap<NodeKind, u64>,
}

impl ExtractedEntities {
    pub fn nodes(&self, kind: NodeKind) -> &[NodeRecord] {
        self.nodes.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, kind: NodeKind) -> u64 {
        self.nodes(kind).len() as u64
    }

    pub fn key_set(&self) -> HashSet<NodeKey> {
        self.nodes.values().flatten().map(NodeRecord::key).collect()
    }
}

/// Turns normalized rows into one node record per unique key per kind.
#[derive(Default)]
pub struct EntityExtractor {
    index: DedupIndex<NodeKey>,
    out: ExtractedEntities,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(mut self, data: &NormalizedDataset) -> ExtractedEntities {
        for provider in &data.providers {
            self.emit(NodeRecord::Provider(ProviderNode {
                provider_id: provider.provider_id.clone(),
                fraud_flag: provider.fraud_flag,
            }));
        }

        for bene in &data.beneficiaries {
            self.emit(beneficiary_node(bene));
        }

        for claim in &data.claims {
            // A repeated claim row contributes nothing beyond its first sighting
            if self.emit(claim_node(claim)) {
                self.scan_identities(claim);
            }
        }

        self.out
    }

    /// Physicians and codes have no table of their own; their identity is
    /// scattered across the claim's role and slot columns.
    fn scan_identities(&mut self, claim: &ClaimRow) {
        for (_, physician_id) in unpivot(claim, PHYSICIAN_COLUMNS) {
            self.note_reference(NodeKind::Physician);
            self.emit_identity(NodeRecord::Physician(PhysicianNode {
                physician_id: physician_id.to_string(),
            }));
        }
        for (code_kind, code) in unpivot(claim, CODE_COLUMNS) {
            self.note_reference(NodeKind::MedicalCode);
            self.emit_identity(NodeRecord::MedicalCode(MedicalCodeNode {
                code: code.to_string(),
                code_kind,
            }));
        }
    }

    fn emit(&mut self, record: NodeRecord) -> bool {
        let kind = record.kind();
        if self.index.first_sighting(record.key()) {
            self.out.nodes.entry(kind).or_default().push(record);
            true
        } else {
            *self.out.stats.duplicate_rows.entry(kind).or_insert(0) += 1;
            false
        }
    }

    fn emit_identity(&mut self, record: NodeRecord) {
        if self.index.first_sighting(record.key()) {
            self.out.nodes.entry(record.kind()).or_default().push(record);
        }
    }

    fn note_reference(&mut self, kind: NodeKind) {
        *self.out.stats.references_scanned.entry(kind).or_insert(0) += 1;
    }
}

fn beneficiary_node(bene: &BeneficiaryRow) -> NodeRecord {
    NodeRecord::Beneficiary(BeneficiaryNode {
        beneficiary_id: bene.beneficiary_id.clone(),
        age: bene.age,
        state: bene.state.clone(),
        county: bene.county.clone(),
        deceased_flag: bene.deceased_flag,
        gender: bene.gender.clone(),
        race: bene.race.clone(),
        renal_disease: bene.renal_disease,
        chronic_conditions: bene.chronic_conditions.clone(),
    })
}

fn claim_node(claim: &ClaimRow) -> NodeRecord {
    NodeRecord::Claim(ClaimNode {
        claim_id: claim.claim_id.clone(),
        claim_kind: claim.claim_kind,
        total_cost: claim.total_cost,
        reimbursed_amount: claim.reimbursed_amount,
        deductible_amount: claim.deductible_amount,
        start_date: claim.start_date,
        end_date: claim.end_date,
        claim_duration_days: claim.claim_duration_days,
        admission_date: claim.admission_date,
        discharge_date: claim.discharge_date,
        diagnosis_group_code: claim.diagnosis_group_code.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::extract::tests::claim_row;

    #[test]
    fn test_physician_seen_in_many_rows_yields_one_node() {
        let mut data = NormalizedDataset::default();
        let mut first = claim_row("CLM1", "PRV1", "BENE1");
        first.slots.insert("AttendingPhysician".into(), "PHY1".into());
        let mut second = claim_row("CLM2", "PRV1", "BENE1");
        second.slots.insert("OperatingPhysician".into(), "PHY1".into());
        second.slots.insert("OtherPhysician".into(), "PHY1".into());
        data.claims = vec![first, second];

        let entities = EntityExtractor::new().extract(&data);
        assert_eq!(entities.count(NodeKind::Physician), 1);
        assert_eq!(entities.count(NodeKind::Claim), 2);
        assert_eq!(entities.stats.references_scanned[&NodeKind::Physician], 3);
    }

    #[test]
    fn test_same_code_in_both_namespaces_yields_two_nodes() {
        let mut data = NormalizedDataset::default();
        let mut claim = claim_row("CLM1", "PRV1", "BENE1");
        claim.slots.insert("ClmDiagnosisCode_1".into(), "4019".into());
        claim.slots.insert("ClmDiagnosisCode_2".into(), "4019".into());
        claim.slots.insert("ClmProcedureCode_1".into(), "4019".into());
        data.claims = vec![claim];

        let entities = EntityExtractor::new().extract(&data);
        let codes = entities.nodes(NodeKind::MedicalCode);
        assert_eq!(codes.len(), 2);
        let keys: HashSet<NodeKey> = codes.iter().map(NodeRecord::key).collect();
        assert!(keys.contains(&NodeKey::medical_code("4019", CodeKind::Diagnosis)));
        assert!(keys.contains(&NodeKey::medical_code("4019", CodeKind::Procedure)));
    }

    #[test]
    fn test_duplicate_claim_rows_keep_first_sighting() {
        let mut data = NormalizedDataset::default();
        let mut first = claim_row("CLM1", "PRV1", "BENE1");
        first.total_cost = 10.0;
        let mut again = claim_row("CLM1", "PRV1", "BENE1");
        again.total_cost = 99.0;
        data.claims = vec![first, again];

        let entities = EntityExtractor::new().extract(&data);
        assert_eq!(entities.count(NodeKind::Claim), 1);
        assert_eq!(entities.stats.duplicate_rows[&NodeKind::Claim], 1);
        match &entities.nodes(NodeKind::Claim)[0] {
            NodeRecord::Claim(c) => assert_eq!(c.total_cost, 10.0),
            other => panic!("unexpected record {:?}", other),
        }
    }
}
