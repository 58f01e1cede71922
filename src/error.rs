use std::io;
use std::num::TryFromIntError;

use thiserror::Error;

/// Result type for CDF operations.
pub type Result<T> = std::result::Result<T, CdfError>;

/// Errors raised while reading or writing CDF files.
#[derive(Error, Debug)]
pub enum CdfError {
    /// Magic numbers, version fields, or record headers are inconsistent with
    /// the format. Raised eagerly while a file is opened.
    #[error("malformed CDF: {0}")]
    Malformed(String),

    /// An encoding, data type, compression kind, or record kind that this
    /// library does not implement.
    #[error("unsupported CDF feature: {0}")]
    Unsupported(String),

    /// The MD5 trailer does not match the file contents. Surfaced on the
    /// first data read after open, never silently.
    #[error("checksum mismatch: file carries {expected}, computed {computed}")]
    ChecksumMismatch { expected: String, computed: String },

    /// A GZIP payload failed to inflate or deflate, attached to the offending
    /// record's file offset.
    #[error("compression failure at offset {offset:#x}: {reason}")]
    CompressionFailed { offset: u64, reason: String },

    /// Variable or attribute lookup by name or number failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// A value lies outside the valid range for its type, or a write-side
    /// record index is out of bounds.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A write-side error left the writer unusable; only `close` is legal.
    #[error("writer is poisoned by an earlier error")]
    Poisoned,

    /// The writer was closed; no further mutation is permitted.
    #[error("writer is already closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),

    /// An on-disk integer field does not fit the native width it is used at.
    #[error("integer field out of native range: {0}")]
    IntWidth(#[from] TryFromIntError),
}
