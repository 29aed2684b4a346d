#![allow(dead_code)]

use chrono::NaiveDate;
use claims_graph::pipeline::ingestion::{RawDataset, RawRow};
use claims_graph::pipeline::loader::LoaderConfig;

pub fn row(pairs: &[(&str, &str)]) -> RawRow {
    RawRow::from_pairs(pairs.iter().copied())
}

pub fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

/// Small batches and no backoff so retries stay fast.
pub fn fast_loader(batch_size: usize, max_retries: u32) -> LoaderConfig {
    LoaderConfig {
        batch_size,
        max_retries,
        retry_backoff_ms: 0,
        max_in_flight: 1,
    }
}

pub fn providers() -> Vec<RawRow> {
    vec![
        row(&[("Provider", "PRV1"), ("PotentialFraud", "Yes")]),
        row(&[("Provider", "PRV2"), ("PotentialFraud", "No")]),
    ]
}

pub fn beneficiaries() -> Vec<RawRow> {
    vec![
        row(&[
            ("BeneID", "BENE1"),
            ("DOB", "1935-06-01"),
            ("DOD", "NA"),
            ("State", "39"),
            ("County", "230"),
        ]),
        row(&[
            ("BeneID", "BENE2"),
            ("DOB", "1940-01-15"),
            ("DOD", "2009-10-01"),
            ("State", "10"),
            ("County", "600"),
        ]),
    ]
}

pub fn inpatient() -> Vec<RawRow> {
    vec![row(&[
        ("BeneID", "BENE1"),
        ("ClaimID", "CLM_IN1"),
        ("ClaimStartDt", "2009-04-12"),
        ("ClaimEndDt", "2009-04-18"),
        ("Provider", "PRV1"),
        ("InscClaimAmtReimbursed", "5000"),
        ("DeductibleAmtPaid", "1068"),
        ("AdmissionDt", "2009-04-12"),
        ("DischargeDt", "2009-04-18"),
        ("DiagnosisGroupCode", "201"),
        ("AttendingPhysician", "PHY1"),
        ("OperatingPhysician", "PHY2"),
        ("ClmDiagnosisCode_1", "4019"),
        ("ClmDiagnosisCode_2", "4019"),
        ("ClmProcedureCode_1", "4516.0"),
    ])]
}

pub fn outpatient() -> Vec<RawRow> {
    vec![row(&[
        ("BeneID", "BENE2"),
        ("ClaimID", "CLM_OUT1"),
        ("ClaimStartDt", "2009-06-01"),
        ("ClaimEndDt", "2009-06-01"),
        ("Provider", "PRV2"),
        ("InscClaimAmtReimbursed", "100"),
        ("AttendingPhysician", "PHY1"),
        ("ClmDiagnosisCode_1", "V5866"),
    ])]
}

/// Two providers (one flagged), two beneficiaries, one claim of each kind.
///
/// Expected graph: 2 providers, 2 beneficiaries, 2 claims, 2 physicians,
/// 3 medical codes; FILED 2, HAS_CLAIM 2, ATTENDED_BY 3, INCLUDES_CODE 3.
pub fn sample_dataset() -> RawDataset {
    RawDataset::new(providers(), beneficiaries(), inpatient(), outpatient())
}
