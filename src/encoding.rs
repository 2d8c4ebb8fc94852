//! Chooses between the flat and JSON representations of a file
use crate::error::{CodecError, FileError};
use crate::file::File;
use crate::nacha;

/// The two wire representations of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentKind {
    #[default]
    Flat,
    Json,
}

impl ContentKind {
    /// Anything that is not a JSON media type is treated as the flat format.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.to_ascii_lowercase().contains("application/json") {
            ContentKind::Json
        } else {
            ContentKind::Flat
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ContentKind::Flat => "text/plain",
            ContentKind::Json => "application/json",
        }
    }
}

/// Decodes an inbound payload and checks its record-level structure.
pub fn decode(bytes: &[u8], content_type: &str) -> Result<File, FileError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(FileError::NoFileProvided);
    }

    let file = match ContentKind::from_content_type(content_type) {
        ContentKind::Json => serde_json::from_slice(bytes).map_err(CodecError::from),
        ContentKind::Flat => nacha::read(bytes),
    }
    .map_err(FileError::Decode)?;

    file.validate()
        .map_err(|e| FileError::Decode(CodecError::Invalid(e)))?;
    Ok(file)
}

pub fn encode(file: &File, kind: ContentKind) -> Result<Vec<u8>, FileError> {
    match kind {
        ContentKind::Json => serde_json::to_vec(file).map_err(CodecError::from),
        ContentKind::Flat => nacha::write(file),
    }
    .map_err(FileError::Encode)
}
