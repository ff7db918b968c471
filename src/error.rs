use std::path::PathBuf;

use thiserror::Error;

use crate::slice::Slice;
use crate::tag::Tag;
use crate::value::ValueKind;

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;

/// Failures while decoding a single DICOM stream.
///
/// All of these are scoped to one file: the loader logs them and moves on to
/// the next file.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("No 'DICM' marker at offset 0 or 128")]
    NotADicomStream,

    #[error("Stream truncated at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedStream {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unknown value representation {code:?} for tag {tag}")]
    UnknownValueKind { tag: Tag, code: String },

    #[error("Invalid {kind} value: {reason}")]
    InvalidValue { kind: ValueKind, reason: String },

    #[error("Length {length} of {kind} value is not a multiple of {width}")]
    InvalidLength {
        kind: ValueKind,
        length: usize,
        width: usize,
    },

    #[error("Undefined length is not supported for {kind} element {tag}")]
    UndefinedLength { tag: Tag, kind: ValueKind },

    #[error("Unexpected tag {tag} in {context}")]
    UnexpectedTag { tag: Tag, context: &'static str },

    #[error("Malformed date/time {0:?}")]
    MalformedDateTime(String),

    #[error("Missing required attribute {name} {tag}")]
    MissingAttribute { name: &'static str, tag: Tag },

    #[error("Unsupported pixel layout: {0}")]
    UnsupportedPixelLayout(String),

    #[error("No frame decoder available for transfer syntax {0}")]
    NoDecoderAvailable(String),

    #[error("Reader panicked: {0}")]
    ReaderPanicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A decode failure attributed to the file it happened in.
#[derive(Debug, Error)]
#[error("Unable to read DICOM file {}: {source}", .path.display())]
pub struct FileError {
    pub path: PathBuf,
    #[source]
    pub source: DecodeError,
}

/// A slice whose shape or pixel type does not match the volume it was
/// offered to. The slice is handed back untouched.
#[derive(Debug, Error)]
#[error("Incompatible slice '{}': {reason}", .slice.info().title)]
pub struct IncompatibleSlice {
    pub slice: Box<Slice>,
    pub reason: String,
}
