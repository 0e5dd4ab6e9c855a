#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # marc-update
//!
//! Reads a stream of MARC records in any of four encodings and submits every
//! record to an OpenUpdate cataloging service, with bounded concurrency and
//! an error threshold that aborts the job.
//!
//! ## Quick Start
//!
//! ### Detecting the format of an input
//!
//! ```
//! use marc_update::sniffer::FormatSniffer;
//! use marc_update::{Charset, MarcFormat};
//! use std::io::{Cursor, Read};
//!
//! let input = Cursor::new(b"001 00 *a12345678*b870970\n245 00 *aTitle\n".to_vec());
//! let (format, mut input) = FormatSniffer::default().sniff(input, Charset::utf8()).unwrap();
//! assert_eq!(format, MarcFormat::DanMarc2Line);
//!
//! // The sniffed input still starts at byte zero
//! let mut text = String::new();
//! input.read_to_string(&mut text).unwrap();
//! assert!(text.starts_with("001 00"));
//! ```
//!
//! ### Reading records
//!
//! ```
//! use marc_update::formats::{open_reader, FormatReaderExt, ReaderOptions};
//! use marc_update::{Charset, MarcFormat};
//! use std::io::Cursor;
//!
//! let input = Cursor::new(b"001 00 *a12345678*b870970\n245 00 *aTitle\n".to_vec());
//! let mut reader = open_reader(input, MarcFormat::DanMarc2Line, Charset::utf8(), ReaderOptions::default());
//! let records: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
//! assert_eq!(records[0].identifier().to_string(), "12345678:870970");
//! ```
//!
//! ## Modules
//!
//! - [`record`] - Core MARC record structures (`Record`, `Field`, `Subfield`)
//! - [`leader`] - MARC record leader (24-byte header)
//! - [`charset`] - Input charsets, including DanMarc2
//! - [`formats`] - The `FormatReader` trait and format tags
//! - [`reader`] - ISO 2709 binary records
//! - [`line_format`] - MARC and DanMarc2 line format
//! - [`marcxml`] - MARCXchange / MARCXML
//! - [`sniffer`] - Format detection from a byte sample
//! - [`update`] - OpenUpdate SOAP client
//! - [`outcome`] - Submission outcomes and reporting
//! - [`dispatch`] - Concurrent batched submission with an error threshold
//! - [`config`] - Job configuration
//! - [`job`] - Sniff, read and dispatch in one call
//! - [`cli`] - Command line arguments
//! - [`error`] - Error types

pub mod charset;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod formats;
pub mod job;
pub mod leader;
pub mod line_format;
pub mod marcxml;
pub mod outcome;
pub mod reader;
pub mod record;
pub mod sniffer;
pub mod update;

pub use charset::Charset;
pub use config::JobConfig;
pub use dispatch::{DispatchEngine, DispatchError, DispatchLimits, JobSummary};
pub use error::{MarcError, Result};
pub use formats::{FormatReader, MarcFormat};
pub use leader::Leader;
pub use outcome::{OutcomeReporter, SubmissionOutcome};
pub use reader::MarcReader;
pub use record::{Field, Record, RecordIdentifier, Subfield};
pub use sniffer::FormatSniffer;
pub use update::{RemoteUpdater, UpdateError};
