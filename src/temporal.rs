//! Effective-date rules and the clock they are evaluated against
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};

use crate::error::{BatchKind, FileError};
use crate::file::{AchDate, File};

/// Source of the current time. Injected so rules can be tested against a fixed day.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    /// The current calendar day in the clock's own zone.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock, either in the server's local zone or a configured offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    offset: Option<FixedOffset>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_offset(offset: FixedOffset) -> Self {
        Self {
            offset: Some(offset),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.offset {
            Some(offset) => Utc::now().with_timezone(&offset),
            None => Local::now().fixed_offset(),
        }
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<FixedOffset>);

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self(now)
    }

    /// Midday UTC on the given day; `None` for an impossible date.
    pub fn on(year: i32, month: u32, day: u32) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let noon = date.and_hms_opt(12, 0, 0)?.and_utc();
        Some(Self(noon.fixed_offset()))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Rejects a file holding any batch whose effective entry date is before `today`.
///
/// Batches are scanned in order, then IAT batches; the first stale batch is
/// reported. Batches without a header, or without an effective date, are skipped.
pub fn has_old_batches(file: &File, today: NaiveDate) -> Result<(), FileError> {
    let batches = file.batches.iter().map(|batch| {
        let date = batch.header.as_ref().and_then(|h| h.effective_entry_date);
        (BatchKind::Batch, batch.token(), date)
    });
    let iat_batches = file.iat_batches.iter().map(|batch| {
        let date = batch.header.as_ref().and_then(|h| h.effective_entry_date);
        (BatchKind::IatBatch, batch.token(), date)
    });

    for (kind, batch, date) in batches.chain(iat_batches) {
        if let Some(date) = date.filter(|d| is_stale(d, today)) {
            return Err(FileError::StaleEffectiveDate {
                file_id: file.id.clone(),
                kind,
                batch,
                date,
            });
        }
    }
    Ok(())
}

fn is_stale(date: &AchDate, today: NaiveDate) -> bool {
    date.to_naive_date() < today
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{Batch, BatchHeader, IatBatch, IatBatchHeader};
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(number: u32, date: Option<NaiveDate>) -> Batch {
        Batch {
            header: Some(BatchHeader {
                batch_number: number,
                effective_entry_date: date.map(AchDate::from),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn iat_batch(number: u32, date: Option<NaiveDate>) -> IatBatch {
        IatBatch {
            header: Some(IatBatchHeader {
                batch_number: number,
                effective_entry_date: date.map(AchDate::from),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn today_and_later_pass() {
        let today = day(2026, 10, 19);
        let file = File {
            id: "f1".into(),
            batches: vec![batch(1, Some(today)), batch(2, Some(day(2026, 12, 1)))],
            iat_batches: vec![iat_batch(3, Some(today))],
            ..Default::default()
        };

        assert!(has_old_batches(&file, today).is_ok());
    }

    #[test]
    fn yesterday_is_stale() {
        let today = day(2026, 10, 19);
        let file = File {
            id: "f1".into(),
            batches: vec![batch(1, Some(today)), batch(2, Some(day(2026, 10, 18)))],
            ..Default::default()
        };

        match has_old_batches(&file, today) {
            Err(FileError::StaleEffectiveDate {
                file_id,
                kind,
                batch,
                date,
            }) => {
                assert_eq!(file_id, "f1");
                assert_eq!(kind, BatchKind::Batch);
                assert_eq!(batch, "0000002");
                assert_eq!(date.to_naive_date(), day(2026, 10, 18));
            }
            other => panic!("expected stale date, got {other:?}"),
        }
    }

    #[test]
    fn first_stale_batch_is_reported() {
        let today = day(2026, 10, 19);
        let file = File {
            batches: vec![batch(7, Some(day(2026, 1, 1)))],
            iat_batches: vec![iat_batch(8, Some(day(2025, 1, 1)))],
            ..Default::default()
        };

        let err = has_old_batches(&file, today).unwrap_err();
        assert!(matches!(
            err,
            FileError::StaleEffectiveDate { kind: BatchKind::Batch, ref batch, .. } if batch == "0000007"
        ));
    }

    #[test]
    fn iat_batches_use_their_own_header() {
        let today = day(2026, 10, 19);
        // the domestic batch is current, only the IAT batch is stale
        let file = File {
            batches: vec![batch(1, Some(today))],
            iat_batches: vec![iat_batch(2, Some(day(2026, 10, 1)))],
            ..Default::default()
        };

        let err = has_old_batches(&file, today).unwrap_err();
        assert!(matches!(
            err,
            FileError::StaleEffectiveDate { kind: BatchKind::IatBatch, ref batch, .. } if batch == "0000002"
        ));
    }

    #[test]
    fn missing_headers_and_dates_are_skipped() {
        let today = day(2026, 10, 19);
        let file = File {
            batches: vec![Batch::default(), batch(1, None)],
            iat_batches: vec![IatBatch::default()],
            ..Default::default()
        };

        assert!(has_old_batches(&file, today).is_ok());
    }

    #[test]
    fn clock_day_follows_its_offset() {
        // 23:30 UTC is already the next day five hours east
        let utc = Utc.with_ymd_and_hms(2026, 10, 19, 23, 30, 0).unwrap();
        let east = FixedOffset::east_opt(5 * 3600).unwrap();

        assert_eq!(FixedClock::new(utc.fixed_offset()).today(), day(2026, 10, 19));
        assert_eq!(FixedClock::new(utc.with_timezone(&east)).today(), day(2026, 10, 20));
        assert_eq!(FixedClock::on(2026, 2, 30).map(|c| c.today()), None);
    }
}
