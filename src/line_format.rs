//! Readers for the two textual line formats.
//!
//! Both formats write one field per line, `TAG IND DELIM code value DELIM code value`:
//!
//! ```text
//! 001 00 $a50938409$b870970
//! 245 00 $aRødgrød med fløde
//!     $cen kogebog
//! $
//! ```
//!
//! The MARC line format uses `$` as subfield delimiter, the DanMarc2 line
//! format uses `*` and escapes delimiters with `@` (`@*` is a literal star,
//! `@@` a literal at sign). Lines starting with whitespace continue the
//! previous field. Records are separated by a blank line, a line holding
//! only `$` (both formats), or a line holding only the delimiter.

use crate::charset::{Charset, DANMARC2_ESCAPE};
use crate::error::{MarcError, Result};
use crate::formats::{FormatReader, ReaderOptions};
use crate::leader::Leader;
use crate::record::{is_control_tag, Field, Record};
use std::io::{BufRead, BufReader, Read};

/// Record terminator line shared by both formats.
const RECORD_TERMINATOR: &str = "$";

/// Which of the line formats to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineSyntax {
    /// MARC line format, `$` delimited
    Line,
    /// DanMarc2 line format, `*` delimited with `@` escapes
    DanMarc2,
}

impl LineSyntax {
    /// Subfield delimiter of this syntax.
    #[must_use]
    pub const fn delimiter(self) -> char {
        match self {
            LineSyntax::Line => '$',
            LineSyntax::DanMarc2 => '*',
        }
    }
}

/// Streaming reader for line-format records.
#[derive(Debug)]
pub struct LineFormatReader<R: Read> {
    reader: BufReader<R>,
    syntax: LineSyntax,
    charset: Charset,
    options: ReaderOptions,
    buffer: Vec<u8>,
    line_number: usize,
    records_read: usize,
}

impl<R: Read> LineFormatReader<R> {
    /// Create a reader for `syntax`, decoding UTF-8.
    pub fn new(reader: R, syntax: LineSyntax) -> Self {
        LineFormatReader {
            reader: BufReader::new(reader),
            syntax,
            charset: Charset::utf8(),
            options: ReaderOptions::default(),
            buffer: Vec::new(),
            line_number: 0,
            records_read: 0,
        }
    }

    /// Set the charset lines are decoded with.
    #[must_use]
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Set reader options.
    #[must_use]
    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    fn escaping(&self) -> bool {
        self.syntax == LineSyntax::DanMarc2 || self.charset.is_format_sensitive()
    }

    /// Next physical line without its line break, or `None` at EOF.
    fn next_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        while matches!(self.buffer.last(), Some(b'\n' | b'\r')) {
            self.buffer.pop();
        }

        let text = self.charset.decode_lossy(&self.buffer);
        if self.line_number == 1 {
            if let Some(stripped) = text.strip_prefix('\u{FEFF}') {
                return Ok(Some(stripped.to_string()));
            }
        }
        Ok(Some(text))
    }

    /// Collect the logical lines of the next record with their line numbers.
    fn next_record_lines(&mut self) -> Result<Vec<(usize, String)>> {
        let terminator = self.syntax.delimiter().to_string();
        let mut lines: Vec<(usize, String)> = Vec::new();

        while let Some(text) = self.next_line()? {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed == RECORD_TERMINATOR || trimmed == terminator {
                if lines.is_empty() {
                    continue;
                }
                break;
            }

            if text.starts_with(char::is_whitespace) {
                if let Some((_, previous)) = lines.last_mut() {
                    previous.push(' ');
                    previous.push_str(trimmed);
                    continue;
                }
                lines.push((self.line_number, trimmed.to_string()));
                continue;
            }

            lines.push((self.line_number, text));
        }

        Ok(lines)
    }

    fn parse_line(&self, line: usize, text: &str, record: &mut Record) -> Result<()> {
        let invalid = |message: String| MarcError::InvalidLine { line, message };

        let tag: String = text.chars().take(3).collect();
        if tag.len() != 3 || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid(format!("expected a 3 character tag, got '{tag}'")));
        }
        let rest = &text[3..];

        let mut segments = split_unescaped(rest, self.syntax.delimiter(), self.escaping());
        if segments.len() == 1 {
            let raw = rest.strip_prefix(' ').unwrap_or(rest);
            if tag == "LDR" || tag == "000" {
                let padded = format!("{raw:<24}");
                record.leader = Leader::from_bytes(padded.as_bytes())
                    .map_err(|e| invalid(e.to_string()))?;
            } else if is_control_tag(&tag) {
                let value = if self.options.include_whitespace_padding {
                    raw
                } else {
                    raw.trim()
                };
                record.add_control_field(tag, value.to_string());
            } else {
                return Err(invalid(format!(
                    "field {tag} has no '{}' subfield delimiter",
                    self.syntax.delimiter()
                )));
            }
            return Ok(());
        }

        let subfields = segments.split_off(1);
        let indicators: Vec<char> = segments[0].trim().chars().collect();
        if indicators.len() > 2 {
            return Err(invalid(format!(
                "invalid indicators '{}' for field {tag}",
                segments[0].trim()
            )));
        }

        let mut field = Field::new(
            tag,
            indicators.first().copied().unwrap_or(' '),
            indicators.get(1).copied().unwrap_or(' '),
        );
        for segment in subfields {
            let mut chars = segment.chars();
            let Some(code) = chars.next() else {
                continue;
            };
            let value = chars.as_str();
            let value = match (self.options.include_whitespace_padding, self.syntax) {
                (false, _) => value.trim(),
                (true, LineSyntax::DanMarc2) => value.trim_end(),
                (true, LineSyntax::Line) => value,
            };
            field.add_subfield(code, value.to_string());
        }
        record.add_field(field);
        Ok(())
    }
}

/// Split `text` at unescaped delimiters, resolving `@` escapes when enabled.
fn split_unescaped(text: &str, delimiter: char, escaping: bool) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if escaping && c == DANMARC2_ESCAPE {
            match chars.peek() {
                Some(&next) if next == delimiter || next == DANMARC2_ESCAPE => {
                    current.push(next);
                    chars.next();
                },
                _ => current.push(c),
            }
        } else if c == delimiter {
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    segments.push(current);
    segments
}

impl<R: Read + std::fmt::Debug> FormatReader for LineFormatReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        let lines = self.next_record_lines()?;
        if lines.is_empty() {
            return Ok(None);
        }

        let mut record = Record::new(Leader::default());
        for (line, text) in &lines {
            self.parse_line(*line, text, &mut record)?;
        }

        self.records_read += 1;
        Ok(Some(record))
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}
