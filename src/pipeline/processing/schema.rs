//! Declarative column layout of the claim extracts.
//!
//! Physician roles and diagnosis/procedure slots are plain data: each entry
//! maps one source column to the tag carried by the edges unpivoted from it.
//! Adding a role or a code slot means adding an entry here.

use crate::constants::*;
use crate::domain::{ClaimKind, CodeKind, PhysicianRole};
use crate::pipeline::ingestion::SourceTable;

/// One source column and the tag its values carry once unpivoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpivotColumn<T> {
    pub column: &'static str,
    pub tag: T,
}

const fn slot<T>(column: &'static str, tag: T) -> UnpivotColumn<T> {
    UnpivotColumn { column, tag }
}

pub const PHYSICIAN_COLUMNS: &[UnpivotColumn<PhysicianRole>] = &[
    slot("AttendingPhysician", PhysicianRole::Attending),
    slot("OperatingPhysician", PhysicianRole::Operating),
    slot("OtherPhysician", PhysicianRole::Other),
];

pub const CODE_COLUMNS: &[UnpivotColumn<CodeKind>] = &[
    slot("ClmDiagnosisCode_1", CodeKind::Diagnosis),
    slot("ClmDiagnosisCode_2", CodeKind::Diagnosis),
    slot("ClmDiagnosisCode_3", CodeKind::Diagnosis),
    slot("ClmDiagnosisCode_4", CodeKind::Diagnosis),
    slot("ClmDiagnosisCode_5", CodeKind::Diagnosis),
    slot("ClmDiagnosisCode_6", CodeKind::Diagnosis),
    slot("ClmDiagnosisCode_7", CodeKind::Diagnosis),
    slot("ClmDiagnosisCode_8", CodeKind::Diagnosis),
    slot("ClmDiagnosisCode_9", CodeKind::Diagnosis),
    slot("ClmDiagnosisCode_10", CodeKind::Diagnosis),
    slot("ClmProcedureCode_1", CodeKind::Procedure),
    slot("ClmProcedureCode_2", CodeKind::Procedure),
    slot("ClmProcedureCode_3", CodeKind::Procedure),
    slot("ClmProcedureCode_4", CodeKind::Procedure),
    slot("ClmProcedureCode_5", CodeKind::Procedure),
    slot("ClmProcedureCode_6", CodeKind::Procedure),
];

/// Columns whose null makes a row unusable.
pub fn mandatory_keys(table: SourceTable) -> &'static [&'static str] {
    match table {
        SourceTable::Provider => &[COL_PROVIDER],
        SourceTable::Beneficiary => &[COL_BENEFICIARY],
        SourceTable::Inpatient | SourceTable::Outpatient => {
            &[COL_CLAIM, COL_PROVIDER, COL_BENEFICIARY]
        }
    }
}

/// Every column of the table's contract, in the order the quality report lists them.
pub fn contract_columns(table: SourceTable) -> Vec<&'static str> {
    match table {
        SourceTable::Provider => vec![COL_PROVIDER, COL_POTENTIAL_FRAUD],
        SourceTable::Beneficiary => {
            let mut cols = vec![
                COL_BENEFICIARY,
                COL_DOB,
                COL_DOD,
                COL_GENDER,
                COL_RACE,
                COL_RENAL_DISEASE,
                COL_STATE,
                COL_COUNTY,
            ];
            cols.extend(CHRONIC_CONDITION_COLUMNS.iter().map(|(col, _)| *col));
            cols
        }
        SourceTable::Inpatient | SourceTable::Outpatient => {
            let mut cols = vec![
                COL_BENEFICIARY,
                COL_CLAIM,
                COL_CLAIM_START,
                COL_CLAIM_END,
                COL_PROVIDER,
                COL_REIMBURSED,
                COL_DEDUCTIBLE,
            ];
            if table == SourceTable::Inpatient {
                cols.extend([COL_ADMISSION, COL_DISCHARGE, COL_DIAGNOSIS_GROUP]);
            }
            cols.extend(PHYSICIAN_COLUMNS.iter().map(|c| c.column));
            cols.extend(CODE_COLUMNS.iter().map(|c| c.column));
            cols
        }
    }
}

/// Columns whose absence from an extract's header is fatal.
pub fn required_header(table: SourceTable) -> &'static [&'static str] {
    mandatory_keys(table)
}

/// The extract a claim kind is read from.
pub fn claim_table(kind: ClaimKind) -> SourceTable {
    match kind {
        ClaimKind::Inpatient => SourceTable::Inpatient,
        ClaimKind::Outpatient => SourceTable::Outpatient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_slot_layout() {
        let diagnosis = CODE_COLUMNS
            .iter()
            .filter(|c| c.tag == CodeKind::Diagnosis)
            .count();
        let procedure = CODE_COLUMNS
            .iter()
            .filter(|c| c.tag == CodeKind::Procedure)
            .count();

        assert_eq!(diagnosis, 10);
        assert_eq!(procedure, 6);
        assert_eq!(PHYSICIAN_COLUMNS.len(), 3);
    }

    #[test]
    fn test_outpatient_contract_has_no_inpatient_only_columns() {
        let cols = contract_columns(SourceTable::Outpatient);
        assert!(!cols.contains(&COL_ADMISSION));
        assert!(contract_columns(SourceTable::Inpatient).contains(&COL_ADMISSION));
    }

    #[test]
    fn test_claim_table_per_kind() {
        assert_eq!(claim_table(ClaimKind::Inpatient), SourceTable::Inpatient);
        assert_eq!(claim_table(ClaimKind::Outpatient), SourceTable::Outpatient);
    }
}
