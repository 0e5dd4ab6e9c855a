//! Input formats and the record source abstraction.
//!
//! # Supported Formats
//!
//! | Format | Reader | Description |
//! |--------|--------|-------------|
//! | MARCXchange | [`MarcXchangeReader`](crate::marcxml::MarcXchangeReader) | ISO 25577 / MARCXML documents |
//! | Line | [`LineFormatReader`](crate::line_format::LineFormatReader) | `$` delimited line format |
//! | DanMarc2 line | [`LineFormatReader`](crate::line_format::LineFormatReader) | `*` delimited line format |
//! | ISO 2709 | [`MarcReader`](crate::reader::MarcReader) | Binary MARC interchange format |
//!
//! The format of an input is decided once, by the
//! [`FormatSniffer`](crate::sniffer::FormatSniffer), and [`open_reader`] turns
//! the tag into a boxed [`FormatReader`].

mod traits;

pub use traits::{FormatReader, FormatReaderExt, RecordIterator};

use crate::charset::Charset;
use crate::line_format::{LineFormatReader, LineSyntax};
use crate::marcxml::MarcXchangeReader;
use crate::reader::MarcReader;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io::Read;

/// Record encoding of an input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarcFormat {
    /// MARCXchange or MARCXML document
    MarcXchange,
    /// MARC line format (`$` subfield delimiter)
    Line,
    /// DanMarc2 line format (`*` subfield delimiter)
    DanMarc2Line,
    /// ISO 2709 binary records
    Iso2709,
}

impl MarcFormat {
    /// Get the human-readable name for this format.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MarcXchange => "MARCXchange",
            Self::Line => "LINE",
            Self::DanMarc2Line => "DANMARC2 LINE",
            Self::Iso2709 => "ISO 2709",
        }
    }
}

impl std::fmt::Display for MarcFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Options passed through to the record readers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Keep leading and trailing whitespace of line-format subfield values
    pub include_whitespace_padding: bool,
}

/// Construct the record source for `format`.
///
/// `charset` is used as given; callers adjust it with
/// [`Charset::for_format`] first.
pub fn open_reader<R>(
    input: R,
    format: MarcFormat,
    charset: Charset,
    options: ReaderOptions,
) -> Box<dyn FormatReader>
where
    R: Read + Debug + 'static,
{
    match format {
        MarcFormat::MarcXchange => Box::new(MarcXchangeReader::new(input).with_charset(charset)),
        MarcFormat::Line => Box::new(
            LineFormatReader::new(input, LineSyntax::Line)
                .with_charset(charset)
                .with_options(options),
        ),
        MarcFormat::DanMarc2Line => Box::new(
            LineFormatReader::new(input, LineSyntax::DanMarc2)
                .with_charset(charset)
                .with_options(options),
        ),
        MarcFormat::Iso2709 => Box::new(MarcReader::new(input).with_charset(charset)),
    }
}
