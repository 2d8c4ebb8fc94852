//! Error types surfaced by the engine
use std::fmt;

use crate::file::AchDate;
use crate::lifecycle::FileState;

/// Structural problems found in a decoded or stored file.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid routing number {0:?}")]
    InvalidRoutingNumber(String),
    #[error("{0} is empty")]
    MissingField(&'static str),
    #[error("batch {batch} ODFI identification {value:?} must be 8 digits")]
    InvalidOdfi { batch: String, value: String },
    #[error("batch {batch} entry {trace_number} has a bad RDFI check digit: {routing}")]
    EntryCheckDigit {
        batch: String,
        trace_number: String,
        routing: String,
    },
}

/// Failures of the fixed-width and JSON codecs.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("payload is not valid UTF-8")]
    NotText,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: record is {len} characters, expected 94")]
    RecordLength { line: usize, len: usize },
    #[error("line {line}: unknown record type {kind:?}")]
    UnknownRecordType { line: usize, kind: char },
    #[error("line {line}: unexpected {record} record")]
    UnexpectedRecord { line: usize, record: &'static str },
    #[error("line {line}: field {field} is invalid: {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("line {line}: {field} is {actual} but the control record says {expected}")]
    ControlMismatch {
        line: usize,
        field: &'static str,
        expected: u64,
        actual: u64,
    },
    #[error("missing file header record")]
    MissingFileHeader,
    #[error("missing file control record")]
    MissingFileControl,
    #[error("{kind} {index} has no header record")]
    MissingBatchHeader { kind: BatchKind, index: usize },
    #[error("{kind} {index} has SEC code {sec:?} which does not match its layout")]
    LayoutMismatch {
        kind: BatchKind,
        index: usize,
        sec: String,
    },
    #[error("field {field} value {value:?} does not fit in {width} ASCII characters")]
    FieldWidth {
        field: &'static str,
        value: String,
        width: usize,
    },
    #[error("field {field} value {value:?} must be {width} digits")]
    NotNumeric {
        field: &'static str,
        value: String,
        width: usize,
    },
    #[error("field {field} date {date} cannot be written as YYMMDD")]
    DateOutOfRange { field: &'static str, date: AchDate },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Errors from the file store collaborator.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("failed to encode stored file: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("failed to decode stored file: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("file {0} already exists")]
    AlreadyExists(String),
}

/// Which of the file's two batch collections a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Batch,
    IatBatch,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Batch => f.write_str("batch"),
            BatchKind::IatBatch => f.write_str("IATBatch"),
        }
    }
}

/// Errors returned by the lifecycle service and the encoding bridge.
#[derive(thiserror::Error, Debug)]
pub enum FileError {
    #[error("no ACH file provided")]
    NoFileProvided,
    #[error("invalid file: {0}")]
    Invalid(#[from] ValidationError),
    #[error("unable to decode file: {0}")]
    Decode(#[source] CodecError),
    #[error("file={file_id} {kind}={batch} has EffectiveEntryDate before today: {date}")]
    StaleEffectiveDate {
        file_id: String,
        kind: BatchKind,
        batch: String,
        date: AchDate,
    },
    #[error("file {0} not found")]
    NotFound(String),
    #[error("file {0} already exists")]
    AlreadyExists(String),
    #[error("unable to encode file: {0}")]
    Encode(#[source] CodecError),
    #[error("{op} file {id}: {source}")]
    Storage {
        op: &'static str,
        id: String,
        source: StoreError,
    },
}

impl FileError {
    /// Wraps a store failure with the operation and file it concerned.
    pub(crate) fn storage(op: &'static str, id: &str, source: StoreError) -> Self {
        match source {
            StoreError::AlreadyExists(id) => FileError::AlreadyExists(id),
            source => FileError::Storage {
                op,
                id: id.to_string(),
                source,
            },
        }
    }
}

/// A rejected creation. The ID is kept so callers can correlate the submission.
#[derive(thiserror::Error, Debug)]
#[error("file {id} rejected in state {state:?}: {source}")]
pub struct CreateError {
    pub id: String,
    /// Last state the file reached before it was rejected.
    pub state: FileState,
    pub source: FileError,
}

/// A move that is not an edge of the file lifecycle.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("file cannot move from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: FileState,
    pub to: FileState,
}
