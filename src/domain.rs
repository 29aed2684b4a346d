use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The five node kinds in the claims graph, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Provider,
    Beneficiary,
    Claim,
    Physician,
    MedicalCode,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Provider,
        NodeKind::Beneficiary,
        NodeKind::Claim,
        NodeKind::Physician,
        NodeKind::MedicalCode,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Provider => "Provider",
            NodeKind::Beneficiary => "Beneficiary",
            NodeKind::Claim => "Claim",
            NodeKind::Physician => "Physician",
            NodeKind::MedicalCode => "MedicalCode",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The four relationship kinds, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    Filed,
    HasClaim,
    AttendedBy,
    IncludesCode,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::Filed,
        EdgeKind::HasClaim,
        EdgeKind::AttendedBy,
        EdgeKind::IncludesCode,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EdgeKind::Filed => "FILED",
            EdgeKind::HasClaim => "HAS_CLAIM",
            EdgeKind::AttendedBy => "ATTENDED_BY",
            EdgeKind::IncludesCode => "INCLUDES_CODE",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        EdgeKind::ALL.into_iter().find(|k| k.label() == label)
    }

    /// Node kinds at the (source, target) ends of this relationship.
    pub fn endpoints(&self) -> (NodeKind, NodeKind) {
        match self {
            EdgeKind::Filed => (NodeKind::Provider, NodeKind::Claim),
            EdgeKind::HasClaim => (NodeKind::Beneficiary, NodeKind::Claim),
            EdgeKind::AttendedBy => (NodeKind::Claim, NodeKind::Physician),
            EdgeKind::IncludesCode => (NodeKind::Claim, NodeKind::MedicalCode),
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    Inpatient,
    Outpatient,
}

impl ClaimKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimKind::Inpatient => "inpatient",
            ClaimKind::Outpatient => "outpatient",
        }
    }
}

/// Namespace of a medical code. Diagnosis and procedure codes never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    Diagnosis,
    Procedure,
}

impl CodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeKind::Diagnosis => "diagnosis",
            CodeKind::Procedure => "procedure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicianRole {
    Attending,
    Operating,
    Other,
}

impl PhysicianRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhysicianRole::Attending => "attending",
            PhysicianRole::Operating => "operating",
            PhysicianRole::Other => "other",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "attending" => Some(PhysicianRole::Attending),
            "operating" => Some(PhysicianRole::Operating),
            "other" => Some(PhysicianRole::Other),
            _ => None,
        }
    }
}

/// Unique key of a node. Medical codes are keyed on the (code, kind) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKey {
    Provider { id: String },
    Beneficiary { id: String },
    Claim { id: String },
    Physician { id: String },
    MedicalCode { code: String, code_kind: CodeKind },
}

impl NodeKey {
    pub fn provider(id: impl Into<String>) -> Self {
        NodeKey::Provider { id: id.into() }
    }

    pub fn beneficiary(id: impl Into<String>) -> Self {
        NodeKey::Beneficiary { id: id.into() }
    }

    pub fn claim(id: impl Into<String>) -> Self {
        NodeKey::Claim { id: id.into() }
    }

    pub fn physician(id: impl Into<String>) -> Self {
        NodeKey::Physician { id: id.into() }
    }

    pub fn medical_code(code: impl Into<String>, code_kind: CodeKind) -> Self {
        NodeKey::MedicalCode {
            code: code.into(),
            code_kind,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeKey::Provider { .. } => NodeKind::Provider,
            NodeKey::Beneficiary { .. } => NodeKind::Beneficiary,
            NodeKey::Claim { .. } => NodeKind::Claim,
            NodeKey::Physician { .. } => NodeKind::Physician,
            NodeKey::MedicalCode { .. } => NodeKind::MedicalCode,
        }
    }

    /// Canonical string form, unique within a node kind.
    pub fn canonical_id(&self) -> String {
        match self {
            NodeKey::Provider { id }
            | NodeKey::Beneficiary { id }
            | NodeKey::Claim { id }
            | NodeKey::Physician { id } => id.clone(),
            NodeKey::MedicalCode { code, code_kind } => format!("{}:{}", code_kind.as_str(), code),
        }
    }

    /// Inverse of [`NodeKey::canonical_id`].
    pub fn from_canonical(kind: NodeKind, canonical: &str) -> Option<Self> {
        Some(match kind {
            NodeKind::Provider => NodeKey::provider(canonical),
            NodeKind::Beneficiary => NodeKey::beneficiary(canonical),
            NodeKind::Claim => NodeKey::claim(canonical),
            NodeKind::Physician => NodeKey::physician(canonical),
            NodeKind::MedicalCode => {
                let (namespace, code) = canonical.split_once(':')?;
                let code_kind = match namespace {
                    "diagnosis" => CodeKind::Diagnosis,
                    "procedure" => CodeKind::Procedure,
                    _ => return None,
                };
                NodeKey::medical_code(code, code_kind)
            }
        })
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.canonical_id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderNode {
    pub provider_id: String,
    pub fraud_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeneficiaryNode {
    pub beneficiary_id: String,
    pub age: Option<i64>,
    pub state: String,
    pub county: String,
    pub deceased_flag: bool,
    pub gender: Option<String>,
    pub race: Option<String>,
    pub renal_disease: bool,
    /// Chronic-condition flags keyed by condition name (e.g. `alzheimer`).
    pub chronic_conditions: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimNode {
    pub claim_id: String,
    pub claim_kind: ClaimKind,
    pub total_cost: f64,
    pub reimbursed_amount: f64,
    pub deductible_amount: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub claim_duration_days: Option<i64>,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
    pub diagnosis_group_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicianNode {
    pub physician_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalCodeNode {
    pub code: String,
    pub code_kind: CodeKind,
}

/// Store-agnostic node record, ready for loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label")]
pub enum NodeRecord {
    Provider(ProviderNode),
    Beneficiary(BeneficiaryNode),
    Claim(ClaimNode),
    Physician(PhysicianNode),
    MedicalCode(MedicalCodeNode),
}

impl NodeRecord {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRecord::Provider(_) => NodeKind::Provider,
            NodeRecord::Beneficiary(_) => NodeKind::Beneficiary,
            NodeRecord::Claim(_) => NodeKind::Claim,
            NodeRecord::Physician(_) => NodeKind::Physician,
            NodeRecord::MedicalCode(_) => NodeKind::MedicalCode,
        }
    }

    pub fn key(&self) -> NodeKey {
        match self {
            NodeRecord::Provider(p) => NodeKey::provider(&p.provider_id),
            NodeRecord::Beneficiary(b) => NodeKey::beneficiary(&b.beneficiary_id),
            NodeRecord::Claim(c) => NodeKey::claim(&c.claim_id),
            NodeRecord::Physician(p) => NodeKey::physician(&p.physician_id),
            NodeRecord::MedicalCode(m) => NodeKey::medical_code(&m.code, m.code_kind),
        }
    }

    /// Flat key/value view of the record's attributes.
    pub fn properties(&self) -> serde_json::Result<serde_json::Map<String, serde_json::Value>> {
        let value = match self {
            NodeRecord::Provider(p) => serde_json::to_value(p)?,
            NodeRecord::Beneficiary(b) => serde_json::to_value(b)?,
            NodeRecord::Claim(c) => serde_json::to_value(c)?,
            NodeRecord::Physician(p) => serde_json::to_value(p)?,
            NodeRecord::MedicalCode(m) => serde_json::to_value(m)?,
        };
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(serde_json::Map::new()),
        }
    }

    /// Rebuilds a record from the flat properties written by [`NodeRecord::properties`].
    pub fn from_properties(
        kind: NodeKind,
        properties: serde_json::Value,
    ) -> serde_json::Result<Self> {
        Ok(match kind {
            NodeKind::Provider => NodeRecord::Provider(serde_json::from_value(properties)?),
            NodeKind::Beneficiary => NodeRecord::Beneficiary(serde_json::from_value(properties)?),
            NodeKind::Claim => NodeRecord::Claim(serde_json::from_value(properties)?),
            NodeKind::Physician => NodeRecord::Physician(serde_json::from_value(properties)?),
            NodeKind::MedicalCode => NodeRecord::MedicalCode(serde_json::from_value(properties)?),
        })
    }
}

/// Store-agnostic edge record. The whole record is its identity tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub kind: EdgeKind,
    pub source: NodeKey,
    pub target: NodeKey,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<PhysicianRole>,
}

impl EdgeRecord {
    pub fn filed(provider_id: &str, claim_id: &str) -> Self {
        Self {
            kind: EdgeKind::Filed,
            source: NodeKey::provider(provider_id),
            target: NodeKey::claim(claim_id),
            role: None,
        }
    }

    pub fn has_claim(beneficiary_id: &str, claim_id: &str) -> Self {
        Self {
            kind: EdgeKind::HasClaim,
            source: NodeKey::beneficiary(beneficiary_id),
            target: NodeKey::claim(claim_id),
            role: None,
        }
    }

    pub fn attended_by(claim_id: &str, physician_id: &str, role: PhysicianRole) -> Self {
        Self {
            kind: EdgeKind::AttendedBy,
            source: NodeKey::claim(claim_id),
            target: NodeKey::physician(physician_id),
            role: Some(role),
        }
    }

    pub fn includes_code(claim_id: &str, code: &str, code_kind: CodeKind) -> Self {
        Self {
            kind: EdgeKind::IncludesCode,
            source: NodeKey::claim(claim_id),
            target: NodeKey::medical_code(code, code_kind),
            role: None,
        }
    }

    pub fn role_tag(&self) -> &'static str {
        self.role.map(|r| r.as_str()).unwrap_or("")
    }
}

impl fmt::Display for EdgeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Some(role) => write!(
                f,
                "{} -[{} {}]-> {}",
                self.source,
                self.kind,
                role.as_str(),
                self.target
            ),
            None => write!(f, "{} -[{}]-> {}", self.source, self.kind, self.target),
        }
    }
}
