//! Fixed-width NACHA record codec
//!
//! Every record is 94 ASCII characters. Field positions below are 1-indexed and
//! inclusive, matching the published record layouts. Control records (8 and 9)
//! are derived when writing and checked when reading, so they are not part of
//! the [`File`] model.
use crate::error::{BatchKind, CodecError};
use crate::file::{
    AchDate, Addenda, Batch, BatchHeader, EntryDetail, File, FileHeader, IatBatch,
    IatBatchHeader, IatEntryDetail,
};

pub const RECORD_LENGTH: usize = 94;
const BLOCKING_FACTOR: usize = 10;
const HASH_MODULUS: u64 = 10_000_000_000;
pub const IAT_SEC_CODE: &str = "IAT";

/// Parses a flat ACH file.
pub fn read(bytes: &[u8]) -> Result<File, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::NotText)?;

    let mut reader = Reader::default();
    for (index, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        reader.push(Record::new(index + 1, line)?)?;
    }
    reader.finish()
}

/// Serializes a file, deriving control records and block filler.
pub fn write(file: &File) -> Result<Vec<u8>, CodecError> {
    let mut lines = vec![file_header(&file.header)?];
    let mut totals = Totals::default();
    let mut batch_count = 0;

    for (index, batch) in file.batches.iter().enumerate() {
        let header = batch.header.as_ref().ok_or(CodecError::MissingBatchHeader {
            kind: BatchKind::Batch,
            index,
        })?;
        if header.standard_entry_class_code == IAT_SEC_CODE {
            return Err(CodecError::LayoutMismatch {
                kind: BatchKind::Batch,
                index,
                sec: header.standard_entry_class_code.clone(),
            });
        }

        lines.push(batch_header(header)?);
        let mut batch_totals = Totals::default();
        for entry in &batch.entries {
            lines.push(entry_detail(entry)?);
            batch_totals.entry(entry.transaction_code, &entry.rdfi_identification, entry.amount);
            for addenda in &entry.addenda {
                lines.push(addenda_record(addenda)?);
                batch_totals.addenda();
            }
        }
        lines.push(batch_control(
            header.service_class_code,
            &batch_totals,
            &header.company_identification,
            &header.odfi_identification,
            header.batch_number,
        )?);

        totals.absorb(&batch_totals);
        batch_count += 1;
    }

    for (index, batch) in file.iat_batches.iter().enumerate() {
        let header = batch.header.as_ref().ok_or(CodecError::MissingBatchHeader {
            kind: BatchKind::IatBatch,
            index,
        })?;
        if header.standard_entry_class_code != IAT_SEC_CODE {
            return Err(CodecError::LayoutMismatch {
                kind: BatchKind::IatBatch,
                index,
                sec: header.standard_entry_class_code.clone(),
            });
        }

        lines.push(iat_batch_header(header)?);
        let mut batch_totals = Totals::default();
        for entry in &batch.entries {
            lines.push(iat_entry_detail(entry)?);
            batch_totals.entry(entry.transaction_code, &entry.rdfi_identification, entry.amount);
            for addenda in &entry.addenda {
                lines.push(addenda_record(addenda)?);
                batch_totals.addenda();
            }
        }
        lines.push(batch_control(
            header.service_class_code,
            &batch_totals,
            &header.originator_identification,
            &header.odfi_identification,
            header.batch_number,
        )?);

        totals.absorb(&batch_totals);
        batch_count += 1;
    }

    let blocks = (lines.len() + 1).div_ceil(BLOCKING_FACTOR);
    lines.push(file_control(batch_count, blocks as u64, &totals)?);
    while lines.len() % BLOCKING_FACTOR != 0 {
        lines.push("9".repeat(RECORD_LENGTH));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out.into_bytes())
}

/// Running control totals for a batch or the whole file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Totals {
    records: u64, // entries plus addenda
    hash: u64,
    debit: u64,
    credit: u64,
}

impl Totals {
    fn entry(&mut self, transaction_code: u8, rdfi: &str, amount: u64) {
        self.records += 1;
        self.hash = (self.hash + routing_value(rdfi)) % HASH_MODULUS;
        match transaction_code % 10 {
            1..=4 => self.credit += amount,
            5..=9 => self.debit += amount,
            _ => {}
        }
    }
    fn addenda(&mut self) {
        self.records += 1;
    }
    fn absorb(&mut self, other: &Totals) {
        self.records += other.records;
        self.hash = (self.hash + other.hash) % HASH_MODULUS;
        self.debit += other.debit;
        self.credit += other.credit;
    }
}

fn routing_value(rdfi: &str) -> u64 {
    rdfi.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0, |acc, d| acc * 10 + u64::from(d))
}

// writing

struct Line(String);

impl Line {
    fn new(kind: char) -> Self {
        let mut buf = String::with_capacity(RECORD_LENGTH);
        buf.push(kind);
        Line(buf)
    }

    fn check_width(field: &'static str, value: &str, width: usize) -> Result<(), CodecError> {
        if value.is_ascii() && value.len() <= width {
            Ok(())
        } else {
            Err(CodecError::FieldWidth {
                field,
                value: value.to_string(),
                width,
            })
        }
    }

    /// Left-justified, space filled.
    fn alpha(mut self, field: &'static str, value: &str, width: usize) -> Result<Self, CodecError> {
        Self::check_width(field, value, width)?;
        self.0.push_str(&format!("{value:<width$}"));
        Ok(self)
    }

    /// Right-justified, space filled.
    fn right(mut self, field: &'static str, value: &str, width: usize) -> Result<Self, CodecError> {
        Self::check_width(field, value, width)?;
        self.0.push_str(&format!("{value:>width$}"));
        Ok(self)
    }

    /// Exactly `width` digits.
    fn digits(mut self, field: &'static str, value: &str, width: usize) -> Result<Self, CodecError> {
        if value.len() != width || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::NotNumeric {
                field,
                value: value.to_string(),
                width,
            });
        }
        self.0.push_str(value);
        Ok(self)
    }

    /// Zero filled.
    fn number(mut self, field: &'static str, value: u64, width: usize) -> Result<Self, CodecError> {
        let text = format!("{value:0width$}");
        if text.len() > width {
            return Err(CodecError::FieldWidth {
                field,
                value: text,
                width,
            });
        }
        self.0.push_str(&text);
        Ok(self)
    }

    fn date(mut self, field: &'static str, value: Option<AchDate>) -> Result<Self, CodecError> {
        match value {
            None => self.0.push_str("      "),
            Some(date) if (2000..=2099).contains(&date.year()) => {
                self.0
                    .push_str(&date.to_naive_date().format("%y%m%d").to_string());
            }
            Some(date) => return Err(CodecError::DateOutOfRange { field, date }),
        }
        Ok(self)
    }

    fn blank(mut self, width: usize) -> Self {
        self.0.push_str(&" ".repeat(width));
        self
    }

    fn literal(mut self, value: &str) -> Self {
        self.0.push_str(value);
        self
    }

    fn finish(self) -> String {
        debug_assert_eq!(self.0.len(), RECORD_LENGTH, "record {:?}", self.0);
        self.0
    }
}

fn file_header(h: &FileHeader) -> Result<String, CodecError> {
    Ok(Line::new('1')
        .literal("01")
        .right("immediate destination", &h.immediate_destination, 10)?
        .right("immediate origin", &h.immediate_origin, 10)?
        .date("file creation date", h.file_creation_date)?
        .alpha("file creation time", &h.file_creation_time, 4)?
        .alpha("file ID modifier", &h.file_id_modifier, 1)?
        .literal("094")
        .literal("10")
        .literal("1")
        .alpha("immediate destination name", &h.immediate_destination_name, 23)?
        .alpha("immediate origin name", &h.immediate_origin_name, 23)?
        .alpha("reference code", &h.reference_code, 8)?
        .finish())
}

fn batch_header(h: &BatchHeader) -> Result<String, CodecError> {
    Ok(Line::new('5')
        .number("service class code", h.service_class_code.into(), 3)?
        .alpha("company name", &h.company_name, 16)?
        .alpha("company discretionary data", &h.company_discretionary_data, 20)?
        .alpha("company identification", &h.company_identification, 10)?
        .alpha("standard entry class code", &h.standard_entry_class_code, 3)?
        .alpha("company entry description", &h.company_entry_description, 10)?
        .alpha("company descriptive date", &h.company_descriptive_date, 6)?
        .date("effective entry date", h.effective_entry_date)?
        .alpha("settlement date", &h.settlement_date, 3)?
        .alpha("originator status code", &h.originator_status_code, 1)?
        .digits("ODFI identification", &h.odfi_identification, 8)?
        .number("batch number", h.batch_number.into(), 7)?
        .finish())
}

fn iat_batch_header(h: &IatBatchHeader) -> Result<String, CodecError> {
    Ok(Line::new('5')
        .number("service class code", h.service_class_code.into(), 3)?
        .alpha("IAT indicator", &h.iat_indicator, 16)?
        .alpha("foreign exchange indicator", &h.foreign_exchange_indicator, 2)?
        .alpha(
            "foreign exchange reference indicator",
            &h.foreign_exchange_reference_indicator,
            1,
        )?
        .alpha("foreign exchange reference", &h.foreign_exchange_reference, 15)?
        .alpha("ISO destination country code", &h.iso_destination_country_code, 2)?
        .alpha("originator identification", &h.originator_identification, 10)?
        .alpha("standard entry class code", &h.standard_entry_class_code, 3)?
        .alpha("company entry description", &h.company_entry_description, 10)?
        .alpha("ISO originating currency code", &h.iso_originating_currency_code, 3)?
        .alpha("ISO destination currency code", &h.iso_destination_currency_code, 3)?
        .date("effective entry date", h.effective_entry_date)?
        .alpha("settlement date", &h.settlement_date, 3)?
        .alpha("originator status code", &h.originator_status_code, 1)?
        .digits("ODFI identification", &h.odfi_identification, 8)?
        .number("batch number", h.batch_number.into(), 7)?
        .finish())
}

fn addenda_indicator(addenda: &[Addenda]) -> &'static str {
    if addenda.is_empty() { "0" } else { "1" }
}

fn entry_detail(e: &EntryDetail) -> Result<String, CodecError> {
    Ok(Line::new('6')
        .number("transaction code", e.transaction_code.into(), 2)?
        .digits("RDFI identification", &e.rdfi_identification, 8)?
        .number("check digit", e.check_digit.into(), 1)?
        .alpha("DFI account number", &e.dfi_account_number, 17)?
        .number("amount", e.amount, 10)?
        .alpha("identification number", &e.identification_number, 15)?
        .alpha("individual name", &e.individual_name, 22)?
        .alpha("discretionary data", &e.discretionary_data, 2)?
        .literal(addenda_indicator(&e.addenda))
        .alpha("trace number", &e.trace_number, 15)?
        .finish())
}

fn iat_entry_detail(e: &IatEntryDetail) -> Result<String, CodecError> {
    Ok(Line::new('6')
        .number("transaction code", e.transaction_code.into(), 2)?
        .digits("RDFI identification", &e.rdfi_identification, 8)?
        .number("check digit", e.check_digit.into(), 1)?
        .number("addenda records", e.addenda.len() as u64, 4)?
        .blank(13)
        .number("amount", e.amount, 10)?
        .alpha("DFI account number", &e.dfi_account_number, 35)?
        .blank(2)
        .alpha("OFAC screening indicator", &e.ofac_screening_indicator, 1)?
        .alpha(
            "secondary OFAC screening indicator",
            &e.secondary_ofac_screening_indicator,
            1,
        )?
        .literal(addenda_indicator(&e.addenda))
        .alpha("trace number", &e.trace_number, 15)?
        .finish())
}

fn addenda_record(a: &Addenda) -> Result<String, CodecError> {
    Ok(Line::new('7')
        .digits("addenda type code", &a.type_code, 2)?
        .alpha("addenda information", &a.information, 84)?
        .number(
            "entry detail sequence number",
            a.entry_detail_sequence_number.into(),
            7,
        )?
        .finish())
}

fn batch_control(
    service_class_code: u16,
    totals: &Totals,
    company_identification: &str,
    odfi_identification: &str,
    batch_number: u32,
) -> Result<String, CodecError> {
    Ok(Line::new('8')
        .number("service class code", service_class_code.into(), 3)?
        .number("entry/addenda count", totals.records, 6)?
        .number("entry hash", totals.hash, 10)?
        .number("total debit amount", totals.debit, 12)?
        .number("total credit amount", totals.credit, 12)?
        .alpha("company identification", company_identification, 10)?
        .blank(19) // message authentication code
        .blank(6)
        .digits("ODFI identification", odfi_identification, 8)?
        .number("batch number", batch_number.into(), 7)?
        .finish())
}

fn file_control(batch_count: u64, blocks: u64, totals: &Totals) -> Result<String, CodecError> {
    Ok(Line::new('9')
        .number("batch count", batch_count, 6)?
        .number("block count", blocks, 6)?
        .number("entry/addenda count", totals.records, 8)?
        .number("entry hash", totals.hash, 10)?
        .number("total debit amount", totals.debit, 12)?
        .number("total credit amount", totals.credit, 12)?
        .blank(39)
        .finish())
}

// reading

struct Record<'a> {
    line: usize,
    text: &'a str,
}

impl<'a> Record<'a> {
    fn new(line: usize, text: &'a str) -> Result<Self, CodecError> {
        if !text.is_ascii() {
            return Err(CodecError::InvalidField {
                line,
                field: "record",
                value: text.to_string(),
            });
        }
        if text.len() != RECORD_LENGTH {
            return Err(CodecError::RecordLength {
                line,
                len: text.len(),
            });
        }
        Ok(Record { line, text })
    }

    fn kind(&self) -> char {
        self.text.as_bytes()[0] as char
    }

    fn is_filler(&self) -> bool {
        self.text.bytes().all(|b| b == b'9')
    }

    fn field(&self, start: usize, end: usize) -> &'a str {
        &self.text[start - 1..end]
    }

    fn alpha(&self, start: usize, end: usize) -> String {
        self.field(start, end).trim_end().to_string()
    }

    fn invalid(&self, field: &'static str, value: &str) -> CodecError {
        CodecError::InvalidField {
            line: self.line,
            field,
            value: value.to_string(),
        }
    }

    fn unexpected(&self, record: &'static str) -> CodecError {
        CodecError::UnexpectedRecord {
            line: self.line,
            record,
        }
    }

    fn digits(&self, field: &'static str, start: usize, end: usize) -> Result<String, CodecError> {
        let value = self.field(start, end);
        if value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(value.to_string())
        } else {
            Err(self.invalid(field, value))
        }
    }

    fn number<T: std::str::FromStr>(
        &self,
        field: &'static str,
        start: usize,
        end: usize,
    ) -> Result<T, CodecError> {
        let value = self.digits(field, start, end)?;
        value.parse().map_err(|_| self.invalid(field, &value))
    }

    fn literal(&self, field: &'static str, start: usize, end: usize, expected: &str) -> Result<(), CodecError> {
        let value = self.field(start, end);
        if value == expected {
            Ok(())
        } else {
            Err(self.invalid(field, value))
        }
    }

    fn date(&self, field: &'static str, start: usize, end: usize) -> Result<Option<AchDate>, CodecError> {
        let value = self.field(start, end);
        if value.trim().is_empty() {
            return Ok(None);
        }
        let year: i32 = self.number(field, start, start + 1)?;
        let month: u32 = self.number(field, start + 2, start + 3)?;
        let day: u32 = self.number(field, start + 4, end)?;

        AchDate::new_with(2000 + year, month, day)
            .map(Some)
            .ok_or_else(|| self.invalid(field, value))
    }

    fn addenda_indicator(&self) -> Result<bool, CodecError> {
        match self.field(79, 79) {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(self.invalid("addenda record indicator", other)),
        }
    }

    /// Compares a control total against the value recomputed from the records.
    fn check_total(&self, field: &'static str, start: usize, end: usize, actual: u64) -> Result<(), CodecError> {
        let expected: u64 = self.number(field, start, end)?;
        if expected == actual {
            Ok(())
        } else {
            Err(CodecError::ControlMismatch {
                line: self.line,
                field,
                expected,
                actual,
            })
        }
    }

    fn file_header(&self) -> Result<FileHeader, CodecError> {
        self.digits("priority code", 2, 3)?;
        self.literal("record size", 35, 37, "094")?;
        self.literal("blocking factor", 38, 39, "10")?;
        self.literal("format code", 40, 40, "1")?;

        Ok(FileHeader {
            immediate_destination: self.field(4, 13).trim().to_string(),
            immediate_origin: self.field(14, 23).trim().to_string(),
            file_creation_date: self.date("file creation date", 24, 29)?,
            file_creation_time: self.alpha(30, 33),
            file_id_modifier: self.alpha(34, 34),
            immediate_destination_name: self.alpha(41, 63),
            immediate_origin_name: self.alpha(64, 86),
            reference_code: self.alpha(87, 94),
        })
    }

    fn batch_header(&self) -> Result<BatchHeader, CodecError> {
        Ok(BatchHeader {
            service_class_code: self.number("service class code", 2, 4)?,
            company_name: self.alpha(5, 20),
            company_discretionary_data: self.alpha(21, 40),
            company_identification: self.alpha(41, 50),
            standard_entry_class_code: self.alpha(51, 53),
            company_entry_description: self.alpha(54, 63),
            company_descriptive_date: self.alpha(64, 69),
            effective_entry_date: self.date("effective entry date", 70, 75)?,
            settlement_date: self.alpha(76, 78),
            originator_status_code: self.alpha(79, 79),
            odfi_identification: self.digits("ODFI identification", 80, 87)?,
            batch_number: self.number("batch number", 88, 94)?,
        })
    }

    fn iat_batch_header(&self) -> Result<IatBatchHeader, CodecError> {
        Ok(IatBatchHeader {
            service_class_code: self.number("service class code", 2, 4)?,
            iat_indicator: self.alpha(5, 20),
            foreign_exchange_indicator: self.alpha(21, 22),
            foreign_exchange_reference_indicator: self.alpha(23, 23),
            foreign_exchange_reference: self.alpha(24, 38),
            iso_destination_country_code: self.alpha(39, 40),
            originator_identification: self.alpha(41, 50),
            standard_entry_class_code: self.alpha(51, 53),
            company_entry_description: self.alpha(54, 63),
            iso_originating_currency_code: self.alpha(64, 66),
            iso_destination_currency_code: self.alpha(67, 69),
            effective_entry_date: self.date("effective entry date", 70, 75)?,
            settlement_date: self.alpha(76, 78),
            originator_status_code: self.alpha(79, 79),
            odfi_identification: self.digits("ODFI identification", 80, 87)?,
            batch_number: self.number("batch number", 88, 94)?,
        })
    }

    fn entry_detail(&self) -> Result<EntryDetail, CodecError> {
        Ok(EntryDetail {
            transaction_code: self.number("transaction code", 2, 3)?,
            rdfi_identification: self.digits("RDFI identification", 4, 11)?,
            check_digit: self.number("check digit", 12, 12)?,
            dfi_account_number: self.alpha(13, 29),
            amount: self.number("amount", 30, 39)?,
            identification_number: self.alpha(40, 54),
            individual_name: self.alpha(55, 76),
            discretionary_data: self.alpha(77, 78),
            trace_number: self.alpha(80, 94),
            addenda: Vec::new(),
        })
    }

    /// The entry plus the addenda count it declares.
    fn iat_entry_detail(&self) -> Result<(IatEntryDetail, u64), CodecError> {
        let addenda_records = self.number("addenda records", 13, 16)?;
        let entry = IatEntryDetail {
            transaction_code: self.number("transaction code", 2, 3)?,
            rdfi_identification: self.digits("RDFI identification", 4, 11)?,
            check_digit: self.number("check digit", 12, 12)?,
            amount: self.number("amount", 30, 39)?,
            dfi_account_number: self.alpha(40, 74),
            ofac_screening_indicator: self.alpha(77, 77),
            secondary_ofac_screening_indicator: self.alpha(78, 78),
            trace_number: self.alpha(80, 94),
            addenda: Vec::new(),
        };
        Ok((entry, addenda_records))
    }

    fn addenda(&self) -> Result<Addenda, CodecError> {
        Ok(Addenda {
            type_code: self.digits("addenda type code", 2, 3)?,
            information: self.alpha(4, 87),
            entry_detail_sequence_number: self.number("entry detail sequence number", 88, 94)?,
        })
    }
}

enum OpenBatch {
    Domestic {
        batch: Batch,
        totals: Totals,
    },
    Iat {
        batch: IatBatch,
        totals: Totals,
        addenda_counts: Vec<u64>,
    },
}

#[derive(Default)]
struct Reader {
    file: Option<File>,
    open: Option<OpenBatch>,
    addenda_allowed: bool,
    totals: Totals,
    batch_count: u64,
    records: u64,
    closed: bool,
}

impl Reader {
    fn push(&mut self, record: Record<'_>) -> Result<(), CodecError> {
        if self.closed {
            return if record.is_filler() {
                Ok(())
            } else {
                Err(record.unexpected("trailing"))
            };
        }
        if self.file.is_none() && record.kind() != '1' {
            return Err(CodecError::MissingFileHeader);
        }

        self.records += 1;
        match record.kind() {
            '1' => self.file_header(&record),
            '5' => self.batch_header(&record),
            '6' => self.entry_detail(&record),
            '7' => self.addenda(&record),
            '8' => self.batch_control(&record),
            '9' => self.file_control(&record),
            kind => Err(CodecError::UnknownRecordType {
                line: record.line,
                kind,
            }),
        }
    }

    fn file_header(&mut self, record: &Record<'_>) -> Result<(), CodecError> {
        if self.file.is_some() {
            return Err(record.unexpected("file header"));
        }
        self.file = Some(File {
            header: record.file_header()?,
            ..File::default()
        });
        Ok(())
    }

    fn batch_header(&mut self, record: &Record<'_>) -> Result<(), CodecError> {
        if self.open.is_some() {
            return Err(record.unexpected("batch header"));
        }

        let open = if record.field(51, 53) == IAT_SEC_CODE {
            OpenBatch::Iat {
                batch: IatBatch {
                    header: Some(record.iat_batch_header()?),
                    ..IatBatch::default()
                },
                totals: Totals::default(),
                addenda_counts: Vec::new(),
            }
        } else {
            OpenBatch::Domestic {
                batch: Batch {
                    header: Some(record.batch_header()?),
                    ..Batch::default()
                },
                totals: Totals::default(),
            }
        };
        self.open = Some(open);
        self.addenda_allowed = false;
        Ok(())
    }

    fn entry_detail(&mut self, record: &Record<'_>) -> Result<(), CodecError> {
        match self.open.as_mut() {
            Some(OpenBatch::Domestic { batch, totals }) => {
                let entry = record.entry_detail()?;
                totals.entry(entry.transaction_code, &entry.rdfi_identification, entry.amount);
                batch.entries.push(entry);
            }
            Some(OpenBatch::Iat {
                batch,
                totals,
                addenda_counts,
            }) => {
                let (entry, addenda_records) = record.iat_entry_detail()?;
                totals.entry(entry.transaction_code, &entry.rdfi_identification, entry.amount);
                batch.entries.push(entry);
                addenda_counts.push(addenda_records);
            }
            None => return Err(record.unexpected("entry detail")),
        }
        self.addenda_allowed = record.addenda_indicator()?;
        Ok(())
    }

    fn addenda(&mut self, record: &Record<'_>) -> Result<(), CodecError> {
        if !self.addenda_allowed {
            return Err(record.unexpected("addenda"));
        }
        let addenda = record.addenda()?;

        let (entry_addenda, totals) = match self.open.as_mut() {
            Some(OpenBatch::Domestic { batch, totals }) => {
                (batch.entries.last_mut().map(|e| &mut e.addenda), totals)
            }
            Some(OpenBatch::Iat { batch, totals, .. }) => {
                (batch.entries.last_mut().map(|e| &mut e.addenda), totals)
            }
            None => return Err(record.unexpected("addenda")),
        };
        let entry_addenda = entry_addenda.ok_or_else(|| record.unexpected("addenda"))?;
        entry_addenda.push(addenda);
        totals.addenda();
        Ok(())
    }

    fn batch_control(&mut self, record: &Record<'_>) -> Result<(), CodecError> {
        let open = self
            .open
            .take()
            .ok_or_else(|| record.unexpected("batch control"))?;
        let file = self.file.as_mut().ok_or(CodecError::MissingFileHeader)?;

        let totals = match open {
            OpenBatch::Domestic { batch, totals } => {
                let (class, number) = batch
                    .header
                    .as_ref()
                    .map(|h| (h.service_class_code, h.batch_number))
                    .unwrap_or_default();
                check_batch_control(record, class, number, &totals)?;
                file.batches.push(batch);
                totals
            }
            OpenBatch::Iat {
                batch,
                totals,
                addenda_counts,
            } => {
                let (class, number) = batch
                    .header
                    .as_ref()
                    .map(|h| (h.service_class_code, h.batch_number))
                    .unwrap_or_default();
                check_batch_control(record, class, number, &totals)?;
                for (entry, declared) in batch.entries.iter().zip(addenda_counts) {
                    let actual = entry.addenda.len() as u64;
                    if actual != declared {
                        return Err(CodecError::ControlMismatch {
                            line: record.line,
                            field: "addenda records",
                            expected: declared,
                            actual,
                        });
                    }
                }
                file.iat_batches.push(batch);
                totals
            }
        };

        self.totals.absorb(&totals);
        self.batch_count += 1;
        self.addenda_allowed = false;
        Ok(())
    }

    fn file_control(&mut self, record: &Record<'_>) -> Result<(), CodecError> {
        if self.open.is_some() {
            return Err(record.unexpected("file control"));
        }

        record.check_total("batch count", 2, 7, self.batch_count)?;
        record.check_total("block count", 8, 13, self.records.div_ceil(BLOCKING_FACTOR as u64))?;
        record.check_total("entry/addenda count", 14, 21, self.totals.records)?;
        record.check_total("entry hash", 22, 31, self.totals.hash)?;
        record.check_total("total debit amount", 32, 43, self.totals.debit)?;
        record.check_total("total credit amount", 44, 55, self.totals.credit)?;

        self.closed = true;
        Ok(())
    }

    fn finish(self) -> Result<File, CodecError> {
        let file = self.file.ok_or(CodecError::MissingFileHeader)?;
        if !self.closed {
            return Err(CodecError::MissingFileControl);
        }
        Ok(file)
    }
}

fn check_batch_control(
    record: &Record<'_>,
    service_class_code: u16,
    batch_number: u32,
    totals: &Totals,
) -> Result<(), CodecError> {
    record.check_total("service class code", 2, 4, service_class_code.into())?;
    record.check_total("entry/addenda count", 5, 10, totals.records)?;
    record.check_total("entry hash", 11, 20, totals.hash)?;
    record.check_total("total debit amount", 21, 32, totals.debit)?;
    record.check_total("total credit amount", 33, 44, totals.credit)?;
    record.check_total("batch number", 88, 94, batch_number.into())
}
