//! Reading ISO 2709 records from binary streams.
//!
//! This module provides [`MarcReader`] for reading ISO 2709 formatted MARC records
//! from any source that implements [`std::io::Read`]. Field values are decoded
//! with the [`Charset`] the reader was built with.
//!
//! # Examples
//!
//! ```
//! use marc_update::{Charset, MarcReader};
//! use std::io::Cursor;
//!
//! let cursor = Cursor::new(Vec::new());
//! let mut reader = MarcReader::new(cursor).with_charset(Charset::latin1());
//!
//! assert!(reader.read_record()?.is_none());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::charset::Charset;
use crate::error::{MarcError, Result};
use crate::formats::FormatReader;
use crate::leader::Leader;
use crate::record::{Field, Record};
use std::io::{BufRead, BufReader, Read};

const FIELD_TERMINATOR: u8 = 0x1E;
const SUBFIELD_DELIMITER: u8 = 0x1F;

/// Reader for ISO 2709 binary MARC format.
///
/// `MarcReader` reads one MARC record at a time. Line breaks between records,
/// as left behind by some export tools, are skipped.
#[derive(Debug)]
pub struct MarcReader<R: Read> {
    reader: BufReader<R>,
    charset: Charset,
    records_read: usize,
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader decoding UTF-8.
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader: BufReader::new(reader),
            charset: Charset::utf8(),
            records_read: 0,
        }
    }

    /// Set the charset used to decode field values.
    #[must_use]
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Read a single MARC record.
    ///
    /// Returns `Ok(Some(record))` if a record was successfully read, `Ok(None)` if EOF
    /// was reached, or `Err` if a parsing error occurred.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The binary data is malformed
    /// - The record is truncated
    /// - An I/O error occurs
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        if !self.skip_line_breaks()? {
            return Ok(None);
        }

        let mut leader_bytes = [0u8; 24];
        match self.reader.read_exact(&mut leader_bytes) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(MarcError::TruncatedRecord(format!(
                    "Unexpected end of file in leader of record {}",
                    self.records_read + 1
                )));
            },
            Err(e) => return Err(MarcError::IoError(e)),
        }

        let leader = Leader::from_bytes(&leader_bytes)?;
        leader.validate_for_reading()?;

        let record_length = leader.record_length as usize;
        let base_address = leader.data_base_address as usize;

        let mut record_data = vec![0u8; record_length - 24];
        match self.reader.read_exact(&mut record_data) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(MarcError::TruncatedRecord(
                    "Unexpected end of file while reading record data".to_string(),
                ));
            },
            Err(e) => return Err(MarcError::IoError(e)),
        }

        let (directory, data) = record_data.split_at(base_address - 24);
        let mut record = Record::new(leader);

        // Directory entries are 12 bytes: tag(3) + length(4) + start position(5)
        for entry in directory.chunks(12) {
            if entry[0] == FIELD_TERMINATOR {
                break;
            }
            if entry.len() < 12 {
                return Err(MarcError::InvalidRecord(
                    "Incomplete directory entry".to_string(),
                ));
            }

            let tag = String::from_utf8_lossy(&entry[0..3]).to_string();
            let field_length = parse_digits(&entry[3..7])?;
            let start_position = parse_digits(&entry[7..12])?;

            let end_position = start_position + field_length;
            if end_position > data.len() {
                return Err(MarcError::InvalidRecord(format!(
                    "Field {tag} exceeds data area"
                )));
            }
            let field_data = &data[start_position..end_position];

            if tag == "LDR" {
                continue;
            }

            // DanMarc2 exports store 001-009 as data fields with subfields
            if tag.as_str() < "010" && memchr::memchr(SUBFIELD_DELIMITER, field_data).is_none() {
                let raw = field_data
                    .strip_suffix(&[FIELD_TERMINATOR])
                    .unwrap_or(field_data);
                record.add_control_field(tag, self.charset.decode_lossy(raw));
            } else {
                let field = parse_data_field(field_data, &tag, self.charset)
                    .map_err(|e| MarcError::InvalidField(format!("Tag {tag}: {e}")))?;
                record.add_field(field);
            }
        }

        self.records_read += 1;
        Ok(Some(record))
    }

    /// Skip CR/LF bytes; returns false at end of input.
    fn skip_line_breaks(&mut self) -> Result<bool> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(false);
            }
            let skip = buf.iter().take_while(|b| matches!(b, b'\r' | b'\n')).count();
            if skip == 0 {
                return Ok(true);
            }
            self.reader.consume(skip);
        }
    }
}

impl<R: Read + std::fmt::Debug> FormatReader for MarcReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        MarcReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}

/// Parse a data field from raw bytes
fn parse_data_field(data: &[u8], tag: &str, charset: Charset) -> Result<Field> {
    if data.len() < 2 {
        return Err(MarcError::InvalidField(
            "Data field too short (needs indicators)".to_string(),
        ));
    }

    let mut field = Field::new(tag.to_string(), data[0] as char, data[1] as char);

    let subfield_data = data[2..]
        .strip_suffix(&[FIELD_TERMINATOR])
        .unwrap_or(&data[2..]);
    if subfield_data.is_empty() {
        return Ok(field);
    }
    if subfield_data[0] != SUBFIELD_DELIMITER {
        return Err(MarcError::InvalidField(
            "Expected subfield delimiter".to_string(),
        ));
    }

    for chunk in subfield_data[1..].split(|&b| b == SUBFIELD_DELIMITER) {
        let Some((&code, value)) = chunk.split_first() else {
            continue;
        };
        field.add_subfield(code as char, charset.decode_lossy(value));
    }

    Ok(field)
}

/// Parse an ASCII number from directory bytes
fn parse_digits(bytes: &[u8]) -> Result<usize> {
    let mut result = 0usize;
    for &byte in bytes {
        if byte.is_ascii_digit() {
            result = result * 10 + (byte - b'0') as usize;
        } else {
            return Err(MarcError::InvalidRecord(format!(
                "Invalid numeric field: expected digits, got byte {}",
                byte as char
            )));
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::DanMarc2Variant;
    use crate::formats::FormatReaderExt;
    use std::io::Cursor;

    const RECORD_TERMINATOR: u8 = 0x1D;

    /// Assemble one ISO 2709 record from `(tag, field bytes without terminator)`.
    fn iso_record(fields: &[(&str, &[u8])]) -> Vec<u8> {
        let mut directory = Vec::new();
        let mut data = Vec::new();
        for (tag, body) in fields {
            let start = data.len();
            data.extend_from_slice(body);
            data.push(FIELD_TERMINATOR);
            directory.extend_from_slice(tag.as_bytes());
            directory.extend_from_slice(format!("{:04}{start:05}", data.len() - start).as_bytes());
        }
        directory.push(FIELD_TERMINATOR);

        let base_address = 24 + directory.len();
        let record_length = base_address + data.len() + 1;

        let mut bytes = format!("{record_length:05}nam a22{base_address:05}   4500").into_bytes();
        bytes.extend_from_slice(&directory);
        bytes.extend_from_slice(&data);
        bytes.push(RECORD_TERMINATOR);
        bytes
    }

    fn title_record() -> Vec<u8> {
        iso_record(&[
            ("001", b"ocm12345"),
            ("003", b"OCoLC"),
            ("245", b"10\x1FaTest title\x1FcBy someone"),
        ])
    }

    #[test]
    fn test_read_simple_record() {
        let mut reader = MarcReader::new(Cursor::new(title_record()));
        let record = reader.read_record().unwrap().unwrap();

        assert_eq!(record.leader.record_type, 'a');
        assert_eq!(record.get_control_field("001"), Some("ocm12345"));
        let field = record.get_field("245").unwrap();
        assert_eq!(field.indicator1, '1');
        assert_eq!(field.indicator2, '0');
        assert_eq!(field.get_subfield('a'), Some("Test title"));
        assert_eq!(field.get_subfield('c'), Some("By someone"));
        assert_eq!(record.identifier().to_string(), "ocm12345:OCoLC");
    }

    #[test]
    fn test_eof_returns_none() {
        let mut reader = MarcReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_read_multiple_records_separated_by_newlines() {
        let mut all_bytes = title_record();
        all_bytes.extend_from_slice(b"\r\n");
        all_bytes.extend_from_slice(&title_record());
        all_bytes.push(b'\n');

        let mut reader = MarcReader::new(Cursor::new(all_bytes));
        let count = reader.records().map(|r| r.unwrap()).count();
        assert_eq!(count, 2);
        assert_eq!(reader.records_read(), Some(2));
    }

    #[test]
    fn test_danmarc2_control_tag_with_subfields_is_data_field() {
        let bytes = iso_record(&[("001", b"00\x1Fa50938409\x1Fb870970")]);
        let mut reader = MarcReader::new(Cursor::new(bytes));
        let record = reader.read_record().unwrap().unwrap();

        assert!(record.get_control_field("001").is_none());
        assert_eq!(record.identifier().to_string(), "50938409:870970");
    }

    #[test]
    fn test_values_decoded_with_charset() {
        let bytes = iso_record(&[("245", b"00\x1Fabl\xCAab\xF1r")]);
        let mut reader = MarcReader::new(Cursor::new(bytes))
            .with_charset(Charset::DanMarc2(DanMarc2Variant::Iso));
        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.get_field("245").unwrap().get_subfield('a'), Some("blåbær"));
    }

    #[test]
    fn test_truncated_record_is_error() {
        let mut bytes = title_record();
        bytes.truncate(bytes.len() - 10);
        let mut reader = MarcReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_record(),
            Err(MarcError::TruncatedRecord(_))
        ));
    }

    #[test]
    fn test_malformed_leader_record_length_too_small() {
        let mut reader = MarcReader::new(Cursor::new(b"00010nam a2200025 i 4500".to_vec()));
        let err = reader.read_record().unwrap_err().to_string();
        assert!(
            err.contains("Record length must be at least 24"),
            "got: {err}"
        );
    }

    #[test]
    fn test_field_past_data_area_is_error() {
        let mut bytes = iso_record(&[("245", b"00\x1Fatitle")]);
        // Directory length of field 245 patched to 0099
        bytes[27..31].copy_from_slice(b"0099");
        let mut reader = MarcReader::new(Cursor::new(bytes));
        let err = reader.read_record().unwrap_err().to_string();
        assert!(err.contains("exceeds data area"), "got: {err}");
    }
}
