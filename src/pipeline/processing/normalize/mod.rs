//! Record Normalizer: per-field null policy and derived fields.
//!
//! Fields fall into three groups:
//! - mandatory keys: a null drops the row and is tallied, never raised;
//! - optional fields: a null stays absent;
//! - derived fields: recomputed from source cells against a caller-supplied
//!   reference date.
//!
//! The normalizer knows nothing about the graph and does not log; it returns
//! a [`QualityReport`] for the orchestrator to publish.

pub mod quality;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::*;
use crate::domain::ClaimKind;
use crate::pipeline::ingestion::{RawDataset, RawRow, RawTable, SourceTable};
use crate::pipeline::processing::schema::{self, CODE_COLUMNS, PHYSICIAN_COLUMNS};

pub use quality::{QualityReport, TableQuality};

/// A source row that lacked one or more mandatory keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejected {
    pub table: SourceTable,
    /// 1-based position of the row within its extract
    pub row_number: usize,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRow {
    pub provider_id: String,
    pub fraud_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeneficiaryRow {
    pub beneficiary_id: String,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub age: Option<i64>,
    pub deceased_flag: bool,
    pub state: String,
    pub county: String,
    pub gender: Option<String>,
    pub race: Option<String>,
    pub renal_disease: bool,
    pub chronic_conditions: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRow {
    pub claim_id: String,
    pub claim_kind: ClaimKind,
    pub provider_id: String,
    pub beneficiary_id: String,
    pub reimbursed_amount: f64,
    pub deductible_amount: f64,
    pub total_cost: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub claim_duration_days: Option<i64>,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
    pub diagnosis_group_code: Option<String>,
    /// Non-null physician and code slots, keyed by source column
    pub slots: BTreeMap<String, String>,
}

impl ClaimRow {
    pub fn slot(&self, column: &str) -> Option<&str> {
        self.slots.get(column).map(String::as_str)
    }
}

/// Normalized output of all four extracts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDataset {
    pub providers: Vec<ProviderRow>,
    pub beneficiaries: Vec<BeneficiaryRow>,
    /// Inpatient rows followed by outpatient rows
    pub claims: Vec<ClaimRow>,
}

/// age = floor((reference − birth) / 365.25 days)
pub fn compute_age(birth_date: NaiveDate, reference_date: NaiveDate) -> i64 {
    let days = (reference_date - birth_date).num_days();
    (days as f64 / DAYS_PER_YEAR).floor() as i64
}

/// Drops the `.0` suffix that float-typed exports append to numeric codes.
pub fn canonical_code(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_suffix(".0") {
        Some(stem) if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) => {
            stem.to_string()
        }
        _ => trimmed.to_string(),
    }
}

pub struct Normalizer {
    reference_date: NaiveDate,
    report: QualityReport,
}

impl Normalizer {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            report: QualityReport::new(reference_date),
        }
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn report(&self) -> &QualityReport {
        &self.report
    }

    /// Normalizes every row of every extract.
    pub fn normalize_dataset(mut self, dataset: &RawDataset) -> (NormalizedDataset, QualityReport) {
        let mut out = NormalizedDataset::default();

        for table in [
            &dataset.providers,
            &dataset.beneficiaries,
            &dataset.inpatient,
            &dataset.outpatient,
        ] {
            let quality = self.report.table_mut(table.table);
            for (column, count) in &table.undecodable_cells {
                *quality.invalid_values.entry(column.clone()).or_insert(0) += count;
            }
        }

        for (idx, row) in dataset.providers.rows.iter().enumerate() {
            if let Ok(p) = self.normalize_provider(row, idx + 1) {
                out.providers.push(p);
            }
        }
        for (idx, row) in dataset.beneficiaries.rows.iter().enumerate() {
            if let Ok(b) = self.normalize_beneficiary(row, idx + 1) {
                out.beneficiaries.push(b);
            }
        }
        for (kind, table) in [
            (ClaimKind::Inpatient, &dataset.inpatient),
            (ClaimKind::Outpatient, &dataset.outpatient),
        ] {
            out.claims.extend(self.normalize_claim_table(kind, table));
        }

        (out, self.report)
    }

    fn normalize_claim_table(&mut self, kind: ClaimKind, table: &RawTable) -> Vec<ClaimRow> {
        table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| self.normalize_claim(kind, row, idx + 1).ok())
            .collect()
    }

    pub fn normalize_provider(
        &mut self,
        row: &RawRow,
        row_number: usize,
    ) -> Result<ProviderRow, RowRejected> {
        self.admit(SourceTable::Provider, row, row_number)?;

        Ok(ProviderRow {
            provider_id: self.key(row, COL_PROVIDER),
            fraud_flag: row.get(COL_POTENTIAL_FRAUD) == Some(FRAUD_MARKER),
        })
    }

    pub fn normalize_beneficiary(
        &mut self,
        row: &RawRow,
        row_number: usize,
    ) -> Result<BeneficiaryRow, RowRejected> {
        let table = SourceTable::Beneficiary;
        self.admit(table, row, row_number)?;

        let birth_date = self.date(table, row, COL_DOB);
        let death_date = self.date(table, row, COL_DOD);
        let age = birth_date.map(|dob| compute_age(dob, self.reference_date));

        let chronic_conditions = CHRONIC_CONDITION_COLUMNS
            .iter()
            .map(|(column, name)| (name.to_string(), self.flag(table, row, column)))
            .collect();

        Ok(BeneficiaryRow {
            beneficiary_id: self.key(row, COL_BENEFICIARY),
            birth_date,
            death_date,
            age,
            deceased_flag: death_date.is_some(),
            state: region(row, COL_STATE),
            county: region(row, COL_COUNTY),
            gender: row.get(COL_GENDER).map(str::to_string),
            race: row.get(COL_RACE).map(str::to_string),
            renal_disease: self.flag(table, row, COL_RENAL_DISEASE),
            chronic_conditions,
        })
    }

    /// Tallies land on the extract `claim_kind` is read from.
    pub fn normalize_claim(
        &mut self,
        claim_kind: ClaimKind,
        row: &RawRow,
        row_number: usize,
    ) -> Result<ClaimRow, RowRejected> {
        let table = schema::claim_table(claim_kind);
        self.admit(table, row, row_number)?;

        let reimbursed_amount = self.amount(table, row, COL_REIMBURSED);
        let deductible_amount = self.amount(table, row, COL_DEDUCTIBLE);
        let start_date = self.date(table, row, COL_CLAIM_START);
        let end_date = self.date(table, row, COL_CLAIM_END);
        let claim_duration_days = match (start_date, end_date) {
            (Some(start), Some(end)) => Some((end - start).num_days()),
            _ => None,
        };

        let (admission_date, discharge_date, diagnosis_group_code) =
            if claim_kind == ClaimKind::Inpatient {
                (
                    self.date(table, row, COL_ADMISSION),
                    self.date(table, row, COL_DISCHARGE),
                    row.get(COL_DIAGNOSIS_GROUP).map(str::to_string),
                )
            } else {
                (None, None, None)
            };

        let mut slots = BTreeMap::new();
        for col in PHYSICIAN_COLUMNS {
            if let Some(value) = row.get(col.column) {
                slots.insert(col.column.to_string(), value.to_string());
            }
        }
        for col in CODE_COLUMNS {
            if let Some(value) = row.get(col.column) {
                slots.insert(col.column.to_string(), canonical_code(value));
            }
        }

        Ok(ClaimRow {
            claim_id: self.key(row, COL_CLAIM),
            claim_kind,
            provider_id: self.key(row, COL_PROVIDER),
            beneficiary_id: self.key(row, COL_BENEFICIARY),
            reimbursed_amount,
            deductible_amount,
            total_cost: reimbursed_amount + deductible_amount,
            start_date,
            end_date,
            claim_duration_days,
            admission_date,
            discharge_date,
            diagnosis_group_code,
            slots,
        })
    }

    /// Tallies nulls over the table contract, then checks mandatory keys.
    fn admit(
        &mut self,
        table: SourceTable,
        row: &RawRow,
        row_number: usize,
    ) -> Result<(), RowRejected> {
        let quality = self.report.table_mut(table);
        quality.rows_read += 1;
        for column in schema::contract_columns(table) {
            if row.is_null(column) {
                quality.bump_null(column);
            }
        }

        let missing: Vec<String> = schema::mandatory_keys(table)
            .iter()
            .filter(|col| row.is_null(**col))
            .map(|col| col.to_string())
            .collect();

        if missing.is_empty() {
            quality.rows_kept += 1;
            return Ok(());
        }

        quality.rows_dropped += 1;
        for column in &missing {
            quality.bump_missing_key(column);
        }
        Err(RowRejected {
            table,
            row_number,
            missing,
        })
    }

    // Only called after `admit` has verified the key is present.
    fn key(&self, row: &RawRow, column: &str) -> String {
        row.get(column).unwrap_or_default().to_string()
    }

    fn date(&mut self, table: SourceTable, row: &RawRow, column: &str) -> Option<NaiveDate> {
        let raw = row.get(column)?;
        match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(_) => {
                self.report.table_mut(table).bump_invalid(column);
                None
            }
        }
    }

    /// Null ⇒ 0. Unparsable or negative ⇒ 0 and counted invalid.
    fn amount(&mut self, table: SourceTable, row: &RawRow, column: &str) -> f64 {
        let Some(raw) = row.get(column) else {
            return 0.0;
        };
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => value,
            _ => {
                self.report.table_mut(table).bump_invalid(column);
                0.0
            }
        }
    }

    /// `1`/`Y`/`Yes` are true; `0`/`2`/`N`/`No` and null are false.
    fn flag(&mut self, table: SourceTable, row: &RawRow, column: &str) -> bool {
        let Some(raw) = row.get(column) else {
            return false;
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "y" | "yes" | "true" => true,
            "0" | "2" | "n" | "no" | "false" => false,
            _ => {
                self.report.table_mut(table).bump_invalid(column);
                false
            }
        }
    }
}

fn region(row: &RawRow, column: &str) -> String {
    row.get(column).unwrap_or(UNKNOWN_REGION).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_beneficiary_age_and_deceased_flag() {
        let mut normalizer = Normalizer::new(reference());
        let row = RawRow::from_pairs([("BeneID", "BENE1"), ("DOB", "1935-06-01")]);

        let bene = normalizer.normalize_beneficiary(&row, 1).unwrap();
        assert_eq!(bene.age, Some(89));
        assert!(!bene.deceased_flag);
        assert_eq!(bene.state, "UNKNOWN");
        assert_eq!(bene.county, "UNKNOWN");
    }

    #[test]
    fn test_death_date_sets_deceased_flag() {
        let mut normalizer = Normalizer::new(reference());
        let row = RawRow::from_pairs([
            ("BeneID", "BENE2"),
            ("DOB", "1940-01-01"),
            ("DOD", "2009-12-01"),
            ("State", "39"),
            ("ChronicCond_Diabetes", "1"),
            ("ChronicCond_Cancer", "2"),
            ("RenalDiseaseIndicator", "Y"),
        ]);

        let bene = normalizer.normalize_beneficiary(&row, 1).unwrap();
        assert!(bene.deceased_flag);
        assert_eq!(bene.state, "39");
        assert!(bene.renal_disease);
        assert_eq!(bene.chronic_conditions["diabetes"], true);
        assert_eq!(bene.chronic_conditions["cancer"], false);
        assert_eq!(bene.chronic_conditions["stroke"], false);
    }

    #[test]
    fn test_total_cost_treats_missing_deductible_as_zero() {
        let mut normalizer = Normalizer::new(reference());
        let row = RawRow::from_pairs([
            ("ClaimID", "CLM1"),
            ("Provider", "PRV1"),
            ("BeneID", "BENE1"),
            ("InscClaimAmtReimbursed", "100.0"),
        ]);

        let claim = normalizer
            .normalize_claim(ClaimKind::Outpatient, &row, 1)
            .unwrap();
        assert_eq!(claim.total_cost, 100.0);
        assert_eq!(claim.deductible_amount, 0.0);
        assert_eq!(claim.claim_kind, ClaimKind::Outpatient);
    }

    #[test]
    fn test_missing_claim_id_drops_row_and_counts_it() {
        let mut normalizer = Normalizer::new(reference());
        let row = RawRow::from_pairs([("Provider", "PRV1"), ("BeneID", "BENE1")]);

        let rejected = normalizer
            .normalize_claim(ClaimKind::Inpatient, &row, 7)
            .unwrap_err();
        assert_eq!(rejected.row_number, 7);
        assert_eq!(rejected.missing, vec!["ClaimID".to_string()]);

        let quality = normalizer.report().table(SourceTable::Inpatient);
        assert_eq!(quality.rows_dropped, 1);
        assert_eq!(quality.rows_kept, 0);
        assert_eq!(quality.missing_keys["ClaimID"], 1);
        assert_eq!(normalizer.report().rows_dropped(SourceTable::Outpatient), 0);
    }

    #[test]
    fn test_optional_slots_stay_absent() {
        let mut normalizer = Normalizer::new(reference());
        let row = RawRow::from_pairs([
            ("ClaimID", "CLM1"),
            ("Provider", "PRV1"),
            ("BeneID", "BENE1"),
            ("AttendingPhysician", "PHY1"),
            ("OtherPhysician", ""),
            ("ClmProcedureCode_1", "4019.0"),
        ]);

        let claim = normalizer
            .normalize_claim(ClaimKind::Inpatient, &row, 1)
            .unwrap();
        assert_eq!(claim.slot("AttendingPhysician"), Some("PHY1"));
        assert_eq!(claim.slot("OtherPhysician"), None);
        assert_eq!(claim.slot("ClmProcedureCode_1"), Some("4019"));
        assert_eq!(
            normalizer
                .report()
                .table(SourceTable::Inpatient)
                .null_count("OtherPhysician"),
            1
        );
    }

    #[test]
    fn test_invalid_amount_counts_and_defaults_to_zero() {
        let mut normalizer = Normalizer::new(reference());
        let row = RawRow::from_pairs([
            ("ClaimID", "CLM1"),
            ("Provider", "PRV1"),
            ("BeneID", "BENE1"),
            ("InscClaimAmtReimbursed", "-50"),
            ("DeductibleAmtPaid", "abc"),
            ("ClaimStartDt", "2009-13-40"),
        ]);

        let claim = normalizer
            .normalize_claim(ClaimKind::Outpatient, &row, 1)
            .unwrap();
        assert_eq!(claim.total_cost, 0.0);
        assert_eq!(claim.start_date, None);

        let quality = normalizer.report().table(SourceTable::Outpatient);
        assert_eq!(quality.invalid_count("InscClaimAmtReimbursed"), 1);
        assert_eq!(quality.invalid_count("DeductibleAmtPaid"), 1);
        assert_eq!(quality.invalid_count("ClaimStartDt"), 1);
    }

    #[test]
    fn test_claim_duration_and_inpatient_dates() {
        let mut normalizer = Normalizer::new(reference());
        let row = RawRow::from_pairs([
            ("ClaimID", "CLM9"),
            ("Provider", "PRV1"),
            ("BeneID", "BENE1"),
            ("ClaimStartDt", "2009-04-12"),
            ("ClaimEndDt", "2009-04-18"),
            ("AdmissionDt", "2009-04-12"),
            ("DischargeDt", "2009-04-18"),
            ("DiagnosisGroupCode", "201"),
        ]);

        let claim = normalizer
            .normalize_claim(ClaimKind::Inpatient, &row, 1)
            .unwrap();
        assert_eq!(claim.claim_duration_days, Some(6));
        assert_eq!(claim.admission_date, NaiveDate::from_ymd_opt(2009, 4, 12));
        assert_eq!(claim.diagnosis_group_code.as_deref(), Some("201"));
    }

    #[test]
    fn test_canonical_code() {
        assert_eq!(canonical_code("4019.0"), "4019");
        assert_eq!(canonical_code(" V5869 "), "V5869");
        assert_eq!(canonical_code("E8.0"), "E8.0");
    }

    #[test]
    fn test_provider_fraud_flag() {
        let mut normalizer = Normalizer::new(reference());
        let fraud = RawRow::from_pairs([("Provider", "PRV1"), ("PotentialFraud", "Yes")]);
        let clean = RawRow::from_pairs([("Provider", "PRV2"), ("PotentialFraud", "No")]);

        assert!(normalizer.normalize_provider(&fraud, 1).unwrap().fraud_flag);
        assert!(!normalizer.normalize_provider(&clean, 2).unwrap().fraud_flag);
    }

    #[test]
    fn test_claim_tallies_follow_claim_kind() {
        let mut normalizer = Normalizer::new(reference());
        let row = RawRow::from_pairs([
            ("ClaimID", "CLM1"),
            ("Provider", "PRV1"),
            ("BeneID", "BENE1"),
            ("AdmissionDt", "2009-04-12"),
        ]);

        let outpatient = normalizer
            .normalize_claim(ClaimKind::Outpatient, &row, 1)
            .unwrap();
        assert_eq!(outpatient.claim_kind, ClaimKind::Outpatient);
        // Inpatient-only fields are never read off an outpatient row
        assert_eq!(outpatient.admission_date, None);

        normalizer
            .normalize_claim(ClaimKind::Inpatient, &row, 1)
            .unwrap();

        let report = normalizer.report();
        assert_eq!(report.table(SourceTable::Outpatient).rows_read, 1);
        assert_eq!(report.table(SourceTable::Inpatient).rows_read, 1);
        assert_eq!(report.table(SourceTable::Provider).rows_read, 0);
        assert_eq!(report.table(SourceTable::Beneficiary).rows_read, 0);
    }

    #[test]
    fn test_undecodable_cells_count_as_invalid_values() {
        let mut outpatient = RawTable::new(
            SourceTable::Outpatient,
            vec![RawRow::from_pairs([
                ("ClaimID", "CLM1"),
                ("Provider", "PRV1"),
                ("BeneID", "BENE1"),
                ("OtherPhysician", "PH\u{FFFD}Y2"),
            ])],
        );
        outpatient.undecodable_cells.insert("OtherPhysician".to_string(), 1);
        let dataset = RawDataset {
            outpatient,
            ..RawDataset::new(vec![], vec![], vec![], vec![])
        };

        let (normalized, report) = Normalizer::new(reference()).normalize_dataset(&dataset);
        assert_eq!(normalized.claims.len(), 1);
        let quality = report.table(SourceTable::Outpatient);
        assert_eq!(quality.invalid_count("OtherPhysician"), 1);
        assert_eq!(quality.rows_kept, 1);
    }
}
