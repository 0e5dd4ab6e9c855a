//! Format detection from a leading byte sample.
//!
//! [`FormatSniffer`] decides which of the four [`MarcFormat`]s an input
//! uses by looking at its first bytes only. [`FormatSniffer::sniff`] reads
//! that sample from a stream and hands back a [`SniffedInput`] that replays
//! the sample before the rest of the stream, so record readers always start
//! at byte zero.
//!
//! Classification, first match wins:
//! 1. text starting with `<` (after whitespace) is MARCXchange
//! 2. a line like `245 00 $a...` is the MARC line format
//! 3. a line like `245 00 *a...` is the DanMarc2 line format
//! 4. anything else is ISO 2709

use crate::charset::Charset;
use crate::formats::MarcFormat;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::{Chain, Cursor, Read};
use thiserror::Error;
use tracing::debug;

/// Number of leading bytes inspected when nothing else is configured.
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

/// Decoding attempts before giving up on a sample.
const DECODE_ATTEMPTS: usize = 8;

/// Samples this short are not worth shortening further.
const MIN_DECODABLE_LEN: usize = 5;

lazy_static! {
    static ref LINE_FORMAT: Regex =
        Regex::new(r"(?m)^[0-9]{3}\s*?(?:\p{Latin}{1,2}|[0-9 ]{2})?\s?\$")
            .unwrap_or_else(|e| panic!("invalid line format regex: {e}"));
    static ref DANMARC2_LINE_FORMAT: Regex =
        Regex::new(r"(?m)^[0-9]{3}\s*?(?:\p{Latin}{1,2}|[0-9 ]{2})?\s?\*")
            .unwrap_or_else(|e| panic!("invalid danmarc2 line format regex: {e}"));
}

/// The input stream could not be read while sampling it.
#[derive(Error, Debug)]
pub enum SniffError {
    /// I/O failure reading the sample
    #[error("Error while trying to deduce MARC format: {0}")]
    Io(#[from] std::io::Error),
}

/// Classifies byte samples into [`MarcFormat`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSniffer {
    sample_size: usize,
}

impl Default for FormatSniffer {
    fn default() -> Self {
        FormatSniffer::new(DEFAULT_SAMPLE_SIZE)
    }
}

impl FormatSniffer {
    /// Create a sniffer reading up to `sample_size` leading bytes.
    #[must_use]
    pub const fn new(sample_size: usize) -> Self {
        FormatSniffer { sample_size }
    }

    /// Number of bytes [`sniff`](Self::sniff) samples.
    #[must_use]
    pub const fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Classify a byte sample decoded with `charset`.
    ///
    /// Never fails: undecodable or unrecognized samples are ISO 2709.
    #[must_use]
    pub fn classify(&self, sample: &[u8], charset: Charset) -> MarcFormat {
        let text = decode_sample(sample, charset.sniffing_charset());

        let leading = text.trim_start_matches(|c: char| c == '\u{FEFF}' || c.is_whitespace());
        if leading.starts_with('<') {
            MarcFormat::MarcXchange
        } else if LINE_FORMAT.is_match(&text) {
            MarcFormat::Line
        } else if DANMARC2_LINE_FORMAT.is_match(&text) {
            MarcFormat::DanMarc2Line
        } else {
            MarcFormat::Iso2709
        }
    }

    /// Sample `input`, classify it and return a stream positioned at byte zero.
    ///
    /// # Errors
    ///
    /// Returns [`SniffError::Io`] if reading the sample fails.
    pub fn sniff<R: Read>(
        &self,
        mut input: R,
        charset: Charset,
    ) -> Result<(MarcFormat, SniffedInput<R>), SniffError> {
        let mut sample = vec![0u8; self.sample_size];
        let mut filled = 0;
        while filled < sample.len() {
            match input.read(&mut sample[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e.into()),
            }
        }
        sample.truncate(filled);

        let format = self.classify(&sample, charset);
        debug!(sampled = filled, %format, %charset, "Deduced input format");

        Ok((format, SniffedInput::new(sample, input)))
    }
}

/// Decode the longest prefix of `sample` that decodes cleanly.
///
/// The sample may end inside a multi-byte sequence, so up to
/// [`DECODE_ATTEMPTS`] progressively shorter prefixes are tried.
fn decode_sample(sample: &[u8], charset: Charset) -> String {
    let mut len = sample.len();
    for _ in 0..DECODE_ATTEMPTS {
        if let Some(text) = charset.decode_strict(&sample[..len]) {
            return text;
        }
        if len <= MIN_DECODABLE_LEN {
            break;
        }
        len -= 1;
    }
    String::new()
}

/// A stream that replays a sniffed sample, then continues with the source.
#[derive(Debug)]
pub struct SniffedInput<R> {
    inner: Chain<Cursor<Vec<u8>>, R>,
}

impl<R: Read> SniffedInput<R> {
    fn new(sample: Vec<u8>, rest: R) -> Self {
        SniffedInput {
            inner: Cursor::new(sample).chain(rest),
        }
    }

    /// The bytes that were sampled.
    #[must_use]
    pub fn sample(&self) -> &[u8] {
        self.inner.get_ref().0.get_ref()
    }
}

impl<R: Read> Read for SniffedInput<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}
