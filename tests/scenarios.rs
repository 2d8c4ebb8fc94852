use std::sync::Arc;

use ach_files::{
    ContentKind, FileError, FileService,
    file::{AchDate, Batch, BatchHeader, EntryDetail, File, FileHeader, IatBatch, IatBatchHeader},
    lifecycle::FileState,
    metrics::CounterMetrics,
    store::SledStore,
    temporal::FixedClock,
};
use anyhow::Context;

use tempfile::tempdir; // Use for test db cleanup.

const FIXTURE: &[u8] = include_bytes!("testdata/ppd-iat.ach");

// Sled locks its directory, so every scenario opens its own database under a
// temp dir that is removed when the guard drops.
fn service_in(
    dir: &tempfile::TempDir,
    name: &str,
    metrics: Arc<CounterMetrics>,
) -> anyhow::Result<FileService> {
    let store = SledStore::open(dir.path().join(name))?;
    service_on(store, (2026, 10, 19), metrics)
}

fn service_on(
    store: SledStore,
    (y, m, d): (i32, u32, u32),
    metrics: Arc<CounterMetrics>,
) -> anyhow::Result<FileService> {
    let clock = FixedClock::on(y, m, d).context("fixed clock")?;
    Ok(FileService::new(Arc::new(store))
        .with_clock(Arc::new(clock))
        .with_metrics(metrics))
}

fn date(y: i32, m: u32, d: u32) -> AchDate {
    AchDate::new_with(y, m, d).expect("valid test date")
}

fn payroll(id: &str, effective: AchDate) -> File {
    File {
        id: id.to_string(),
        header: FileHeader {
            immediate_destination: "231380104".into(),
            immediate_origin: "121042882".into(),
            file_creation_date: Some(date(2026, 10, 19)),
            ..FileHeader::default()
        },
        batches: vec![Batch {
            header: Some(BatchHeader {
                service_class_code: 220,
                company_name: "Acme Payroll".into(),
                company_identification: "1234567890".into(),
                standard_entry_class_code: "PPD".into(),
                company_entry_description: "PAYROLL".into(),
                effective_entry_date: Some(effective),
                odfi_identification: "12104288".into(),
                batch_number: 1,
                ..BatchHeader::default()
            }),
            entries: vec![EntryDetail {
                transaction_code: 22,
                rdfi_identification: "23138010".into(),
                check_digit: 4,
                dfi_account_number: "12345678".into(),
                amount: 100_000,
                individual_name: "Jane Doe".into(),
                trace_number: "121042880000001".into(),
                ..EntryDetail::default()
            }],
            ..Batch::default()
        }],
        ..File::default()
    }
}

#[test]
fn create_get_validate_delete() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let metrics = Arc::new(CounterMetrics::new());
    let service = service_in(&dir, "lifecycle.db", metrics.clone())?;

    let id = service
        .create_file(payroll("", date(2026, 10, 19)))
        .context("File Failed on Create: ")?;
    assert_eq!(id.len(), 40);
    assert_eq!(service.file_state(&id)?, FileState::Stored);

    let stored = service.get_file(&id)?;
    assert_eq!(stored.id, id);
    assert_eq!(stored.batches.len(), 1);

    // validating twice changes nothing
    service.validate_file(&id).context("first validation")?;
    service.validate_file(&id).context("second validation")?;
    assert_eq!(service.get_file(&id)?, stored);

    service.delete_file(&id).context("File Failed on Delete: ")?;
    assert!(matches!(service.get_file(&id), Err(FileError::NotFound(_))));
    assert!(matches!(service.file_state(&id), Err(FileError::NotFound(_))));
    assert!(matches!(service.delete_file(&id), Err(FileError::NotFound(_))));

    assert_eq!(metrics.files_created("121042882", "231380104"), 1);
    assert_eq!(metrics.files_deleted(), 2);
    Ok(())
}

#[test]
fn keeps_caller_id() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let service = service_in(&dir, "caller_id.db", Arc::new(CounterMetrics::new()))?;

    let id = service.create_file(payroll("payroll-2026-10", date(2026, 10, 20)))?;
    assert_eq!(id, "payroll-2026-10");
    assert_eq!(service.get_file("payroll-2026-10")?.id, id);
    Ok(())
}

#[test]
fn stale_batch_is_rejected_and_not_stored() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let metrics = Arc::new(CounterMetrics::new());
    let service = service_in(&dir, "stale.db", metrics.clone())?;

    let err = service
        .create_file(payroll("", date(2026, 10, 18)))
        .expect_err("yesterday's effective date");

    assert_eq!(err.id.len(), 40);
    match &err.source {
        FileError::StaleEffectiveDate { file_id, batch, .. } => {
            assert_eq!(file_id, &err.id);
            assert_eq!(batch, "0000001");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.state, FileState::Identified);
    assert!(err.to_string().contains("EffectiveEntryDate before today"));
    assert!(service.get_files()?.is_empty());
    // rejected submissions still count as created for their routing pair
    assert_eq!(metrics.files_created("121042882", "231380104"), 1);
    Ok(())
}

#[test]
fn stale_iat_batch_is_rejected() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let service = service_in(&dir, "stale_iat.db", Arc::new(CounterMetrics::new()))?;

    let mut file = payroll("iat", date(2026, 10, 20));
    file.iat_batches.push(IatBatch {
        id: "iat-1".into(),
        header: Some(IatBatchHeader {
            standard_entry_class_code: "IAT".into(),
            effective_entry_date: Some(date(2026, 1, 2)),
            odfi_identification: "12104288".into(),
            batch_number: 2,
            ..IatBatchHeader::default()
        }),
        ..IatBatch::default()
    });

    let err = service.create_file(file).expect_err("stale IAT batch");
    assert_eq!(err.id, "iat");
    assert_eq!(
        err.source.to_string(),
        "file=iat IATBatch=iat-1 has EffectiveEntryDate before today: 2026-01-02"
    );
    Ok(())
}

#[test]
fn duplicate_id_is_refused() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let metrics = Arc::new(CounterMetrics::new());
    let service = service_in(&dir, "duplicate.db", metrics.clone())?;

    service.create_file(payroll("same", date(2026, 10, 20)))?;
    let mut second = payroll("same", date(2026, 10, 21));
    second.header.reference_code = "SECOND".into();

    let err = service.create_file(second).expect_err("id already taken");
    assert_eq!(err.id, "same");
    assert_eq!(err.state, FileState::Validated);
    assert!(matches!(err.source, FileError::AlreadyExists(ref id) if id == "same"));

    // the first write wins
    assert_eq!(service.get_file("same")?.header.reference_code, "");
    assert_eq!(metrics.total_created(), 2);
    Ok(())
}

#[test]
fn concurrent_creates_get_distinct_ids() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let metrics = Arc::new(CounterMetrics::new());
    let service = service_in(&dir, "concurrent.db", metrics.clone())?;

    let ids = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| service.create_file(payroll("", date(2026, 10, 19)))))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("create thread panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 8);
    assert_eq!(service.get_files()?.len(), 8);
    assert_eq!(metrics.files_created("121042882", "231380104"), 8);
    Ok(())
}

#[test]
fn submitted_flat_file_renders_back() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let service = service_in(&dir, "submit.db", Arc::new(CounterMetrics::new()))?;

    let id = service
        .submit(FIXTURE, "text/plain")
        .context("File Failed on Submit: ")?;

    let flat = service.get_file_contents(&id, ContentKind::Flat)?;
    assert_eq!(flat, FIXTURE);

    let json = service.get_file_contents(&id, ContentKind::Json)?;
    let from_json: File = serde_json::from_slice(&json)?;
    assert_eq!(from_json, service.get_file(&id)?);
    assert_eq!(from_json.iat_batches.len(), 1);
    Ok(())
}

#[test]
fn undecodable_submissions() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let service = service_in(&dir, "undecodable.db", Arc::new(CounterMetrics::new()))?;

    let err = service.submit(b"", "text/plain").expect_err("empty payload");
    assert!(err.id.is_empty());
    assert_eq!(err.state, FileState::Draft);
    assert!(matches!(err.source, FileError::NoFileProvided));

    let err = service
        .submit(b"{\"header\":", "application/json")
        .expect_err("truncated json");
    assert!(matches!(err.source, FileError::Decode(_)));

    assert!(service.get_files()?.is_empty());
    Ok(())
}

#[test]
fn stored_file_goes_stale_the_next_day() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = SledStore::open(dir.path().join("next_day.db"))?;

    let today = service_on(store.clone(), (2026, 10, 19), Arc::new(CounterMetrics::new()))?;
    let id = today
        .create_file(payroll("", date(2026, 10, 19)))
        .context("File Failed on Create: ")?;
    today.validate_file(&id)?;
    let stored = today.get_file(&id)?;

    // same database, one day later
    let tomorrow = service_on(store, (2026, 10, 20), Arc::new(CounterMetrics::new()))?;
    match tomorrow.validate_file(&id) {
        Err(FileError::StaleEffectiveDate { file_id, batch, date: stale, .. }) => {
            assert_eq!(file_id, id);
            assert_eq!(batch, "0000001");
            assert_eq!(stale, date(2026, 10, 19));
        }
        other => panic!("expected a stale effective date, got {other:?}"),
    }

    // validation never rewrites the file
    assert_eq!(tomorrow.get_file(&id)?, stored);
    assert_eq!(tomorrow.file_state(&id)?, FileState::Stored);
    Ok(())
}

#[test]
fn validate_reports_bad_entry_check_digit() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let service = service_in(&dir, "check_digit.db", Arc::new(CounterMetrics::new()))?;

    // create only applies the date rule, so a bad check digit can be stored
    let mut file = payroll("bad-digit", date(2026, 10, 20));
    file.batches[0].entries[0].check_digit = 5;
    service.create_file(file)?;

    assert!(matches!(
        service.validate_file("bad-digit"),
        Err(FileError::Invalid(_))
    ));
    assert!(matches!(
        service.validate_file("missing"),
        Err(FileError::NotFound(_))
    ));
    Ok(())
}
