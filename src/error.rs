//! Error types for reading MARC records.
//!
//! This module provides the [`MarcError`] type raised by record sources and the
//! format sniffer, and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for record decoding and input handling.
///
/// Any of these surfacing from a record source is a decode fault and stops
/// the job; surfacing from the sniffer it is a setup fault.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// A line of a line-format record could not be parsed.
    #[error("Invalid line {line}: {message}")]
    InvalidLine {
        /// 1-based physical line number in the input
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// Error related to character encoding conversion.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Error during parsing of MARC data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error indicating a truncated or incomplete record.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// IO error from the underlying source.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
