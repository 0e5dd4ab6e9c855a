//! MARCXchange / MARCXML reading and writing.
//!
//! MARCXchange (ISO 25577, namespace `info:lc/xmlns/marcxchange-v1`) is
//! structurally MARCXML: `tag`, `ind1`, `ind2` and `code` are **attributes**,
//! values are text content. Both dialects, with or without namespace
//! prefixes, are accepted on input:
//! - `<record xmlns="info:lc/xmlns/marcxchange-v1">` (default namespace)
//! - `<marcx:record xmlns:marcx="...">` (prefixed namespace)
//! - `<collection>` wrappers holding any number of records
//!
//! [`MarcXchangeReader`] streams records out of a document one at a time;
//! [`record_to_marcxchange`] renders a record for the update payload.

use crate::charset::Charset;
use crate::error::{MarcError, Result};
use crate::formats::FormatReader;
use crate::leader::Leader;
use crate::record::{Field, Record};
use lazy_static::lazy_static;
use quick_xml::de::from_str as xml_from_str;
use quick_xml::events::Event;
use quick_xml::se::to_string as xml_to_string;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// The MARCXchange namespace URI.
pub const MARCXCHANGE_NS: &str = "info:lc/xmlns/marcxchange-v1";

lazy_static! {
    static ref XMLNS_DECLARATION: Regex = Regex::new(r#"\s+xmlns(?::\w+)?="[^"]*""#)
        .unwrap_or_else(|e| panic!("invalid xmlns regex: {e}"));
    static ref ELEMENT_PREFIX: Regex =
        Regex::new(r"<(/?)(\w+):").unwrap_or_else(|e| panic!("invalid prefix regex: {e}"));
}

/// MARCXML record representation for serialization.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "record")]
pub struct MarcxmlRecord {
    /// Default namespace declaration, only set when writing
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// MARC leader string; blank leaders are common in line-format exports
    #[serde(default)]
    pub leader: String,
    /// Control fields (tags 001-009)
    #[serde(default)]
    pub controlfield: Vec<MarcxmlControlField>,
    /// Data fields
    #[serde(default)]
    pub datafield: Vec<MarcxmlDataField>,
}

/// MARCXML control field representation.
#[derive(Debug, Serialize, Deserialize)]
pub struct MarcxmlControlField {
    /// Field tag as an XML attribute (e.g., "001", "008")
    #[serde(rename = "@tag")]
    pub tag: String,
    /// Control field value (text content)
    #[serde(rename = "$value", default)]
    pub value: String,
}

/// MARCXML data field representation.
#[derive(Debug, Serialize, Deserialize)]
pub struct MarcxmlDataField {
    /// Field tag as an XML attribute (e.g., "245", "650")
    #[serde(rename = "@tag")]
    pub tag: String,
    /// First indicator as an XML attribute
    #[serde(rename = "@ind1", default)]
    pub ind1: String,
    /// Second indicator as an XML attribute
    #[serde(rename = "@ind2", default)]
    pub ind2: String,
    /// Subfields
    #[serde(default)]
    pub subfield: Vec<MarcxmlSubfield>,
}

/// MARCXML subfield representation.
#[derive(Debug, Serialize, Deserialize)]
pub struct MarcxmlSubfield {
    /// Subfield code as an XML attribute (e.g., "a", "b", "c")
    #[serde(rename = "@code")]
    pub code: String,
    /// Subfield value (text content)
    #[serde(rename = "$value", default)]
    pub value: String,
}

/// Strip XML namespace prefixes and declarations.
///
/// Handles both `marcx:record` → `record` (prefixed namespace) and
/// `xmlns="..."` / `xmlns:marcx="..."` (namespace declarations).
pub(crate) fn strip_namespaces(xml: &str) -> String {
    let stripped = XMLNS_DECLARATION.replace_all(xml, "");
    ELEMENT_PREFIX.replace_all(&stripped, "<$1").to_string()
}

// ---------------------------------------------------------------------------
// Serialization: Record → MARCXchange
// ---------------------------------------------------------------------------

/// Build the serializable MARCXchange form of a record.
///
/// # Errors
///
/// Returns an error if the leader cannot be serialized.
pub fn marcxchange_record(record: &Record) -> Result<MarcxmlRecord> {
    let leader_bytes = record.leader.as_bytes()?;

    let controlfield = record
        .control_fields_iter()
        .map(|(tag, value)| MarcxmlControlField {
            tag: tag.to_string(),
            value: value.to_string(),
        })
        .collect();

    let datafield = record
        .fields()
        .map(|field| MarcxmlDataField {
            tag: field.tag.clone(),
            ind1: field.indicator1.to_string(),
            ind2: field.indicator2.to_string(),
            subfield: field
                .subfields()
                .map(|sf| MarcxmlSubfield {
                    code: sf.code.to_string(),
                    value: sf.value.clone(),
                })
                .collect(),
        })
        .collect();

    Ok(MarcxmlRecord {
        xmlns: Some(MARCXCHANGE_NS.to_string()),
        leader: String::from_utf8_lossy(&leader_bytes).to_string(),
        controlfield,
        datafield,
    })
}

/// Convert a MARC record to a MARCXchange `<record>` element.
///
/// No XML declaration is written, so the result can be embedded in other
/// documents.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized to XML.
pub fn record_to_marcxchange(record: &Record) -> Result<String> {
    xml_to_string(&marcxchange_record(record)?)
        .map_err(|e| MarcError::ParseError(format!("Failed to serialize to MARCXchange: {e}")))
}

// ---------------------------------------------------------------------------
// Deserialization: MARCXchange → Record
// ---------------------------------------------------------------------------

/// Convert a single MARCXML or MARCXchange `<record>` string to a record.
///
/// # Errors
///
/// Returns an error if the XML is invalid or missing required elements.
pub fn marcxml_to_record(xml: &str) -> Result<Record> {
    let cleaned = strip_namespaces(xml);
    parse_record_element(&cleaned)
}

fn parse_record_element(xml: &str) -> Result<Record> {
    let xml_record: MarcxmlRecord = xml_from_str(xml)
        .map_err(|e| MarcError::ParseError(format!("Failed to parse MARCXchange: {e}")))?;
    marcxml_record_to_record(xml_record)
}

fn marcxml_record_to_record(xml_record: MarcxmlRecord) -> Result<Record> {
    let leader = if xml_record.leader.trim().is_empty() {
        Leader::default()
    } else {
        Leader::from_bytes(xml_record.leader.as_bytes())?
    };
    let mut record = Record::new(leader);

    for cf in xml_record.controlfield {
        record.add_control_field(cf.tag, cf.value);
    }

    for df in xml_record.datafield {
        let ind1 = df.ind1.chars().next().unwrap_or(' ');
        let ind2 = df.ind2.chars().next().unwrap_or(' ');

        let mut field = Field::new(df.tag, ind1, ind2);

        for sf in df.subfield {
            let code = sf
                .code
                .chars()
                .next()
                .ok_or_else(|| MarcError::InvalidField("Missing subfield code".to_string()))?;
            field.add_subfield(code, sf.value);
        }

        record.add_field(field);
    }

    Ok(record)
}

/// Find the byte span of the next `<record>` element in `xml`.
fn next_record_span(xml: &str) -> Result<Option<(usize, usize)>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.check_end_names(false);

    loop {
        let start = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"record" => {
                let end = e.to_end().into_owned();
                reader
                    .read_to_end(end.name())
                    .map_err(|e| MarcError::ParseError(format!("Unterminated record: {e}")))?;
                return Ok(Some((start, reader.buffer_position())));
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"record" => {
                return Ok(Some((start, reader.buffer_position())));
            },
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {},
            Err(e) => {
                return Err(MarcError::ParseError(format!(
                    "Malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )))
            },
        }
    }
}

/// Streaming reader for MARCXchange and MARCXML documents.
///
/// The document is loaded and decoded on the first call to
/// [`read_record`](FormatReader::read_record); records are then parsed one
/// at a time.
#[derive(Debug)]
pub struct MarcXchangeReader<R: Read> {
    source: Option<R>,
    charset: Charset,
    document: String,
    position: usize,
    records_read: usize,
}

impl<R: Read> MarcXchangeReader<R> {
    /// Create a reader decoding the document as UTF-8.
    pub fn new(source: R) -> Self {
        MarcXchangeReader {
            source: Some(source),
            charset: Charset::utf8(),
            document: String::new(),
            position: 0,
            records_read: 0,
        }
    }

    /// Set the charset used to decode the document.
    #[must_use]
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    fn load(&mut self) -> Result<()> {
        if let Some(mut source) = self.source.take() {
            let mut bytes = Vec::new();
            source.read_to_end(&mut bytes)?;
            let text = self.charset.decode_lossy(&bytes);
            self.document = strip_namespaces(text.trim_start_matches('\u{FEFF}'));
        }
        Ok(())
    }
}

impl<R: Read + std::fmt::Debug> FormatReader for MarcXchangeReader<R> {
    fn read_record(&mut self) -> Result<Option<Record>> {
        self.load()?;

        let rest = &self.document[self.position..];
        let Some((start, end)) = next_record_span(rest)? else {
            self.position = self.document.len();
            return Ok(None);
        };

        let record = parse_record_element(&rest[start..end])?;
        self.position += end;
        self.records_read += 1;
        Ok(Some(record))
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}
