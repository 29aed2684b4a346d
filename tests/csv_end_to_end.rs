use std::fs;
use std::path::Path;

use claims_graph::config::{Config, StoreBackend};
use claims_graph::domain::{EdgeKind, NodeKind};
use claims_graph::error::PipelineError;
use claims_graph::pipeline::ingestion::SourceTable;
use claims_graph::run_pipeline;

const PROVIDERS: &str = "\
Provider,PotentialFraud
PRV51001,No
PRV51003,Yes
";

const BENEFICIARIES: &str = "\
BeneID,DOB,DOD,Gender,Race,RenalDiseaseIndicator,State,County,ChronicCond_Alzheimer,ChronicCond_Heartfailure
BENE11001,1943-01-01,NA,1,1,0,39,230,1,2
BENE11002,1936-09-01,2009-09-01,2,1,Y,10,600,2,1
";

const INPATIENT: &str = "\
BeneID,ClaimID,ClaimStartDt,ClaimEndDt,Provider,InscClaimAmtReimbursed,AttendingPhysician,OperatingPhysician,OtherPhysician,AdmissionDt,ClmAdmitDiagnosisCode,DeductibleAmtPaid,DischargeDt,DiagnosisGroupCode,ClmDiagnosisCode_1,ClmDiagnosisCode_2,ClmProcedureCode_1
BENE11001,CLM46614,2009-04-12,2009-04-18,PRV51003,26000,PHYS390922,NA,NA,2009-04-12,7866,1068,2009-04-18,201,1970,4019,
BENE11002,CLM66048,2009-08-31,2009-09-02,PRV51003,5000,PHYS318495,PHYS318495,NA,2009-08-31,6186,1068,2009-09-02,750,6186,2948,7092.0
";

// No DeductibleAmtPaid column at all
const OUTPATIENT: &str = "\
BeneID,ClaimID,ClaimStartDt,ClaimEndDt,Provider,InscClaimAmtReimbursed,AttendingPhysician,OperatingPhysician,OtherPhysician,ClmDiagnosisCode_1
BENE11001,CLM624349,2009-08-10,2009-08-10,PRV51001,50,PHYS340167,NA,NA,71947
BENE11002,,2009-08-11,2009-08-11,PRV51001,30,PHYS999999,NA,NA,V5866
";

fn write_extracts(dir: &Path, outpatient: &str) -> std::io::Result<()> {
    fs::write(dir.join("providers.csv"), PROVIDERS)?;
    fs::write(dir.join("beneficiaries.csv"), BENEFICIARIES)?;
    fs::write(dir.join("inpatient.csv"), INPATIENT)?;
    fs::write(dir.join("outpatient.csv"), outpatient)?;
    Ok(())
}

fn config_for(dir: &Path) -> Config {
    let toml = format!(
        r#"
        reference_date = "2009-12-01"
        reports_dir = "{reports}"

        [input]
        data_dir = "{data}"
        provider_file = "providers.csv"
        beneficiary_file = "beneficiaries.csv"
        inpatient_file = "inpatient.csv"
        outpatient_file = "outpatient.csv"

        [loader]
        batch_size = 2
        retry_backoff_ms = 0

        [store]
        backend = "sqlite"
        path = "{db}"
        "#,
        reports = dir.join("reports").display(),
        data = dir.display(),
        db = dir.join("claims_graph.db").display(),
    );
    let config = Config::from_toml_str(&toml).unwrap();
    config.validate().unwrap();
    config
}

#[tokio::test]
async fn test_csv_extracts_load_into_sqlite() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_extracts(dir.path(), OUTPATIENT)?;
    let config = config_for(dir.path());
    assert_eq!(config.store.backend, StoreBackend::Sqlite);

    let summary = run_pipeline(&config).await?;

    assert!(summary.success, "{:?}", summary.reconciliation.mismatches);
    assert_eq!(summary.rows_read, 8);
    assert_eq!(summary.quality.rows_dropped(SourceTable::Outpatient), 1);
    assert_eq!(summary.extraction.nodes[&NodeKind::Claim], 3);
    // PHYS318495 attends and operates the same claim: two edges, one node
    assert_eq!(summary.extraction.nodes[&NodeKind::Physician], 3);
    assert_eq!(summary.extraction.edges[&EdgeKind::AttendedBy], 4);
    // 1970, 4019, 6186, 2948, 7092, 71947
    assert_eq!(summary.extraction.nodes[&NodeKind::MedicalCode], 6);
    assert_eq!(
        summary.quality.table(SourceTable::Beneficiary).null_count("DOD"),
        1
    );

    let reports_dir = dir.path().join("reports");
    let written = fs::read_dir(&reports_dir)?.count();
    assert_eq!(written, 3);
    assert!(dir.path().join("claims_graph.db").exists());
    Ok(())
}

#[tokio::test]
async fn test_second_run_from_csv_is_idempotent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_extracts(dir.path(), OUTPATIENT)?;
    let config = config_for(dir.path());

    let first = run_pipeline(&config).await?;
    let second = run_pipeline(&config).await?;

    assert!(first.load.total_inserted() > 0);
    assert_eq!(second.load.total_inserted(), 0);
    assert_eq!(
        second.load.total_already_present(),
        first.load.total_inserted()
    );
    assert!(second.success);
    Ok(())
}

#[tokio::test]
async fn test_missing_key_column_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let headless = "\
BeneID,Provider,InscClaimAmtReimbursed
BENE11001,PRV51001,50
";
    write_extracts(dir.path(), headless)?;

    let err = run_pipeline(&config_for(dir.path())).await.unwrap_err();
    match err {
        PipelineError::MissingColumn { table, column } => {
            assert_eq!(table, "outpatient");
            assert_eq!(column, "ClaimID");
        }
        other => panic!("unexpected error: {}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_latin1_byte_in_optional_column_does_not_stop_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_extracts(dir.path(), OUTPATIENT)?;
    let mut outpatient = b"\
BeneID,ClaimID,ClaimStartDt,ClaimEndDt,Provider,InscClaimAmtReimbursed,AttendingPhysician,OperatingPhysician,OtherPhysician,ClmDiagnosisCode_1
BENE11001,CLM624349,2009-08-10,2009-08-10,PRV51001,50,PHYS340167,NA,NA,71947
"
    .to_vec();
    outpatient.extend_from_slice(b"BENE11002,CLM624350,2009-08-11,2009-08-11,PRV51001,30,NA,NA,PH\xE9Y2,V5866\n");
    fs::write(dir.path().join("outpatient.csv"), outpatient)?;

    let summary = run_pipeline(&config_for(dir.path())).await?;

    assert!(summary.success, "{:?}", summary.reconciliation.mismatches);
    assert_eq!(summary.quality.rows_dropped(SourceTable::Outpatient), 0);
    assert_eq!(summary.extraction.nodes[&NodeKind::Claim], 4);
    assert_eq!(
        summary
            .quality
            .table(SourceTable::Outpatient)
            .invalid_count("OtherPhysician"),
        1
    );
    Ok(())
}
