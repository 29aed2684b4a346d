/// Column names of the four source extracts
/// These are a fixed contract with the upstream dataset

// Keys shared by several extracts
pub const COL_PROVIDER: &str = "Provider";
pub const COL_BENEFICIARY: &str = "BeneID";
pub const COL_CLAIM: &str = "ClaimID";

// Provider extract
pub const COL_POTENTIAL_FRAUD: &str = "PotentialFraud";

// Beneficiary extract
pub const COL_DOB: &str = "DOB";
pub const COL_DOD: &str = "DOD";
pub const COL_GENDER: &str = "Gender";
pub const COL_RACE: &str = "Race";
pub const COL_RENAL_DISEASE: &str = "RenalDiseaseIndicator";
pub const COL_STATE: &str = "State";
pub const COL_COUNTY: &str = "County";

/// Chronic-condition columns and the attribute name each one maps to
pub const CHRONIC_CONDITION_COLUMNS: &[(&str, &str)] = &[
    ("ChronicCond_Alzheimer", "alzheimer"),
    ("ChronicCond_Heartfailure", "heart_failure"),
    ("ChronicCond_KidneyDisease", "kidney_disease"),
    ("ChronicCond_Cancer", "cancer"),
    ("ChronicCond_ObstrPulmonary", "obstructive_pulmonary"),
    ("ChronicCond_Depression", "depression"),
    ("ChronicCond_Diabetes", "diabetes"),
    ("ChronicCond_IschemicHeart", "ischemic_heart"),
    ("ChronicCond_Osteoporasis", "osteoporosis"),
    ("ChronicCond_rheumatoidarthritis", "rheumatoid_arthritis"),
    ("ChronicCond_stroke", "stroke"),
];

// Claim extracts
pub const COL_CLAIM_START: &str = "ClaimStartDt";
pub const COL_CLAIM_END: &str = "ClaimEndDt";
pub const COL_REIMBURSED: &str = "InscClaimAmtReimbursed";
pub const COL_DEDUCTIBLE: &str = "DeductibleAmtPaid";
pub const COL_ADMISSION: &str = "AdmissionDt";
pub const COL_DISCHARGE: &str = "DischargeDt";
pub const COL_DIAGNOSIS_GROUP: &str = "DiagnosisGroupCode";

/// Value that marks a fraudulent provider in `PotentialFraud`
pub const FRAUD_MARKER: &str = "Yes";

/// Sentinel for absent region fields
pub const UNKNOWN_REGION: &str = "UNKNOWN";

/// Literal cell values treated as null
pub const NULL_MARKERS: &[&str] = &["", "NA", "NaN", "nan", "NULL", "null"];

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Days per year used for age derivation
pub const DAYS_PER_YEAR: f64 = 365.25;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

/// Tolerance when comparing monetary amounts read back from the store
pub const COST_TOLERANCE: f64 = 0.01;

// Default file names of the Kaggle extracts
pub const DEFAULT_PROVIDER_FILE: &str = "Train-1542865627584.csv";
pub const DEFAULT_BENEFICIARY_FILE: &str = "Train_Beneficiarydata-1542865627584.csv";
pub const DEFAULT_INPATIENT_FILE: &str = "Train_Inpatientdata-1542865627584.csv";
pub const DEFAULT_OUTPATIENT_FILE: &str = "Train_Outpatientdata-1542865627584.csv";

/// Returns true when a raw cell should be read as null
pub fn is_null_marker(value: &str) -> bool {
    let trimmed = value.trim();
    NULL_MARKERS.iter().any(|m| *m == trimmed)
}
