//! Error types for box parsing and serialization.

use crate::boxes::FourCC;
use std::io;
use thiserror::Error;

/// Result type for isobox operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for isobox operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error, including a stream that ends inside a box.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// Header declared a size of 0, or one smaller than the header itself.
    #[error("invalid box size {size} at offset {offset:#x}")]
    InvalidSize { offset: u64, size: u64 },

    /// A box header at `offset` could not be read.
    #[error("bad box header at offset {offset:#x}: {source}")]
    Header {
        offset: u64,
        #[source]
        source: std::boxed::Box<Error>,
    },

    /// Body decoding finished before (or after) the declared end of the box.
    #[error("consumed {consumed} of {declared} declared bytes")]
    SizeMismatch { declared: u64, consumed: u64 },

    /// A failure while parsing one box, naming the innermost box that failed.
    #[error(
        "failed to parse '{typ}' box at offset {offset:#x} (declared {declared} bytes, consumed {consumed}): {source}"
    )]
    Box {
        typ: FourCC,
        offset: u64,
        declared: u64,
        consumed: u64,
        #[source]
        source: std::boxed::Box<Error>,
    },

    /// Bytes written for a box differ from its precomputed size.
    #[error("wrote {written} bytes for '{typ}' box, header says {expected}")]
    SizeDrift {
        typ: FourCC,
        expected: u64,
        written: u64,
    },

    /// Node body kind does not match what its variant encodes.
    #[error("body of '{typ}' box does not match its registered layout")]
    LayoutMismatch { typ: FourCC },

    #[error("box '{typ}' has no field named '{field}'")]
    UnknownField { typ: FourCC, field: String },

    #[error("record is missing field '{field}' or holds it out of order")]
    MissingField { field: &'static str },

    #[error("field '{field}' expects {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },

    #[error("value of field '{field}' does not fit in {bits} bits")]
    FieldOverflow { field: &'static str, bits: u32 },

    #[error("element count {count} from '{source_field}' is out of range")]
    InvalidCount { source_field: &'static str, count: i128 },

    #[error("field '{field}' holds {len} elements but '{source_field}' says {expected}")]
    CountMismatch {
        field: &'static str,
        source_field: &'static str,
        len: usize,
        expected: i128,
    },

    #[error("field '{field}' holds {len} elements but has a fixed length of {expected}")]
    FixedLength {
        field: &'static str,
        len: usize,
        expected: u32,
    },

    /// Payload of a box parsed from a seekable reader was skipped, not loaded.
    #[error("payload of '{typ}' box at offset {offset:#x} was not loaded")]
    PayloadNotLoaded { typ: FourCC, offset: u64 },

    #[error("flags {0:#x} do not fit in 24 bits")]
    FlagsOutOfRange(u32),

    #[error("string field '{field}' is not valid UTF-8")]
    InvalidString { field: &'static str },
}

impl Error {
    /// Wrap a body failure with the identity of the box it happened in.
    ///
    /// Errors that already name a box pass through unchanged so the report
    /// points at the innermost failing box.
    pub(crate) fn in_box(self, typ: FourCC, offset: u64, declared: u64, consumed: u64) -> Self {
        match self {
            Error::Box { .. } | Error::Header { .. } => self,
            other => Error::Box {
                typ,
                offset,
                declared,
                consumed,
                source: std::boxed::Box::new(other),
            },
        }
    }

    /// Tag a header failure with the offset the header started at.
    pub(crate) fn at_header(self, offset: u64) -> Self {
        Error::Header { offset, source: std::boxed::Box::new(self) }
    }

    /// The underlying cause, looking through any box-identity wrapper.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Box { source, .. } | Error::Header { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
