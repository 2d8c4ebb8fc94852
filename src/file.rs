//! In-memory model of an ACH file
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::routing::check_routing_number;

/// A calendar date as carried by ACH records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AchDate(NaiveDate);

impl AchDate {
    pub fn new_with(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(AchDate)
    }
    pub fn to_naive_date(&self) -> NaiveDate {
        self.0
    }
    pub fn year(&self) -> i32 {
        self.0.year()
    }
}

impl From<NaiveDate> for AchDate {
    fn from(value: NaiveDate) -> Self {
        AchDate(value)
    }
}

impl fmt::Display for AchDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<C> minicbor::Encode<C> for AchDate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for AchDate {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(AchDate)
            .ok_or(minicbor::decode::Error::message("day count is out of range"))
    }
}

/// The root aggregate: one file header plus its batches.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(default, rename_all = "camelCase")]
pub struct File {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub header: FileHeader,
    #[n(2)]
    pub batches: Vec<Batch>,
    #[n(3)]
    #[serde(rename = "IATBatches")]
    pub iat_batches: Vec<IatBatch>,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(default, rename_all = "camelCase")]
pub struct FileHeader {
    #[n(0)]
    pub immediate_destination: String, // routing number of the receiving point
    #[n(1)]
    pub immediate_origin: String,
    #[n(2)]
    pub file_creation_date: Option<AchDate>,
    #[n(3)]
    pub file_creation_time: String, // HHMM
    #[n(4)]
    pub file_id_modifier: String,
    #[n(5)]
    pub immediate_destination_name: String,
    #[n(6)]
    pub immediate_origin_name: String,
    #[n(7)]
    pub reference_code: String,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(default, rename_all = "camelCase")]
pub struct Batch {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub header: Option<BatchHeader>,
    #[n(2)]
    pub entries: Vec<EntryDetail>,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchHeader {
    #[n(0)]
    pub service_class_code: u16,
    #[n(1)]
    pub company_name: String,
    #[n(2)]
    pub company_discretionary_data: String,
    #[n(3)]
    pub company_identification: String,
    #[n(4)]
    pub standard_entry_class_code: String,
    #[n(5)]
    pub company_entry_description: String,
    #[n(6)]
    pub company_descriptive_date: String,
    #[n(7)]
    pub effective_entry_date: Option<AchDate>,
    #[n(8)]
    pub settlement_date: String, // julian day, filled in by the operator
    #[n(9)]
    pub originator_status_code: String,
    #[n(10)]
    pub odfi_identification: String,
    #[n(11)]
    pub batch_number: u32,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(default, rename_all = "camelCase")]
pub struct EntryDetail {
    #[n(0)]
    pub transaction_code: u8,
    #[n(1)]
    pub rdfi_identification: String,
    #[n(2)]
    pub check_digit: u8,
    #[n(3)]
    #[serde(rename = "DFIAccountNumber")]
    pub dfi_account_number: String,
    #[n(4)]
    pub amount: u64, // cents
    #[n(5)]
    pub identification_number: String,
    #[n(6)]
    pub individual_name: String,
    #[n(7)]
    pub discretionary_data: String,
    #[n(8)]
    pub trace_number: String,
    #[n(9)]
    pub addenda: Vec<Addenda>,
}

/// An addenda record. The body is kept as-is so every addenda type code fits.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(default, rename_all = "camelCase")]
pub struct Addenda {
    #[n(0)]
    pub type_code: String,
    #[n(1)]
    pub information: String,
    #[n(2)]
    pub entry_detail_sequence_number: u32,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(default, rename_all = "camelCase")]
pub struct IatBatch {
    #[n(0)]
    pub id: String,
    #[n(1)]
    #[serde(rename = "IATBatchHeader")]
    pub header: Option<IatBatchHeader>,
    #[n(2)]
    #[serde(rename = "IATEntryDetails")]
    pub entries: Vec<IatEntryDetail>,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(default, rename_all = "camelCase")]
pub struct IatBatchHeader {
    #[n(0)]
    pub service_class_code: u16,
    #[n(1)]
    #[serde(rename = "IATIndicator")]
    pub iat_indicator: String,
    #[n(2)]
    pub foreign_exchange_indicator: String,
    #[n(3)]
    pub foreign_exchange_reference_indicator: String,
    #[n(4)]
    pub foreign_exchange_reference: String,
    #[n(5)]
    #[serde(rename = "ISODestinationCountryCode")]
    pub iso_destination_country_code: String,
    #[n(6)]
    pub originator_identification: String,
    #[n(7)]
    pub standard_entry_class_code: String,
    #[n(8)]
    pub company_entry_description: String,
    #[n(9)]
    #[serde(rename = "ISOOriginatingCurrencyCode")]
    pub iso_originating_currency_code: String,
    #[n(10)]
    #[serde(rename = "ISODestinationCurrencyCode")]
    pub iso_destination_currency_code: String,
    #[n(11)]
    pub effective_entry_date: Option<AchDate>,
    #[n(12)]
    pub settlement_date: String,
    #[n(13)]
    pub originator_status_code: String,
    #[n(14)]
    pub odfi_identification: String,
    #[n(15)]
    pub batch_number: u32,
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(default, rename_all = "camelCase")]
pub struct IatEntryDetail {
    #[n(0)]
    pub transaction_code: u8,
    #[n(1)]
    pub rdfi_identification: String,
    #[n(2)]
    pub check_digit: u8,
    #[n(3)]
    #[serde(rename = "DFIAccountNumber")]
    pub dfi_account_number: String,
    #[n(4)]
    pub amount: u64,
    #[n(5)]
    #[serde(rename = "OFACScreeningIndicator")]
    pub ofac_screening_indicator: String,
    #[n(6)]
    #[serde(rename = "secondaryOFACScreeningIndicator")]
    pub secondary_ofac_screening_indicator: String,
    #[n(7)]
    pub trace_number: String,
    #[n(8)]
    pub addenda: Vec<Addenda>,
}

impl Batch {
    /// Identifying token used in error messages: the batch ID, or its number.
    pub fn token(&self) -> String {
        batch_token(&self.id, self.header.as_ref().map(|h| h.batch_number))
    }
}

impl IatBatch {
    pub fn token(&self) -> String {
        batch_token(&self.id, self.header.as_ref().map(|h| h.batch_number))
    }
}

fn batch_token(id: &str, batch_number: Option<u32>) -> String {
    match (id, batch_number) {
        ("", Some(number)) => format!("{number:07}"),
        (id, _) => id.to_string(),
    }
}

impl File {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(&self) -> &str {
        &self.header.immediate_origin
    }

    pub fn destination(&self) -> &str {
        &self.header.immediate_destination
    }

    /// Structural checks: header routing identifiers and per-entry check digits.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.header.immediate_origin.is_empty() {
            return Err(ValidationError::MissingField("immediate origin"));
        }
        check_routing_number(&self.header.immediate_destination)?;

        for batch in &self.batches {
            let odfi = batch.header.as_ref().map(|h| h.odfi_identification.as_str());
            check_odfi(&batch.token(), odfi)?;
            for entry in &batch.entries {
                check_entry(
                    &batch.token(),
                    &entry.trace_number,
                    &entry.rdfi_identification,
                    entry.check_digit,
                )?;
            }
        }
        for batch in &self.iat_batches {
            let odfi = batch.header.as_ref().map(|h| h.odfi_identification.as_str());
            check_odfi(&batch.token(), odfi)?;
            for entry in &batch.entries {
                check_entry(
                    &batch.token(),
                    &entry.trace_number,
                    &entry.rdfi_identification,
                    entry.check_digit,
                )?;
            }
        }
        Ok(())
    }
}

fn check_odfi(batch: &str, odfi: Option<&str>) -> Result<(), ValidationError> {
    match odfi {
        Some(value) if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) => {
            Err(ValidationError::InvalidOdfi {
                batch: batch.to_string(),
                value: value.to_string(),
            })
        }
        _ => Ok(()),
    }
}

fn check_entry(
    batch: &str,
    trace_number: &str,
    rdfi: &str,
    check_digit: u8,
) -> Result<(), ValidationError> {
    let routing = format!("{rdfi}{check_digit}");
    check_routing_number(&routing).map_err(|_| ValidationError::EntryCheckDigit {
        batch: batch.to_string(),
        trace_number: trace_number.to_string(),
        routing,
    })
}
