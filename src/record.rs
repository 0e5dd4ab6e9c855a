//! MARC bibliographic record structures.
//!
//! This module provides the record types every reader produces:
//! - [`Record`] - Main bibliographic record structure
//! - [`Field`] - Variable data fields
//! - [`Subfield`] - Named data elements within fields
//! - [`RecordIdentifier`] - The `(record id, agency id)` pair used in diagnostics
//!
//! # Examples
//!
//! ```
//! use marc_update::{Field, Leader, Record};
//!
//! let mut record = Record::new(Leader::default());
//! let mut field = Field::new("001".to_string(), '0', '0');
//! field.add_subfield_str('a', "12345678");
//! field.add_subfield_str('b', "870970");
//! record.add_field(field);
//!
//! assert_eq!(record.identifier().to_string(), "12345678:870970");
//! ```

use crate::leader::Leader;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Placeholder used when part of a record identifier cannot be extracted.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// A MARC bibliographic record
///
/// Control fields are keyed by tag in an `IndexMap`; data fields are kept in
/// the order they were added, repeated tags included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    /// Control fields (000-009) - tag -> value, preserves insertion order
    pub control_fields: IndexMap<String, String>,
    /// Data fields in insertion order
    pub fields: Vec<Field>,
}

/// A data field in a MARC record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 characters)
    pub tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields (stored in `SmallVec` to avoid allocation for typical fields with 4 or fewer subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

/// Natural identifier of a record: record id and owning agency id.
///
/// Only used to make diagnostics readable; missing parts are
/// [`UNKNOWN_IDENTIFIER`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordIdentifier {
    /// Record id (DanMarc2 `001 *a`, MARC 21 control field `001`)
    pub record_id: String,
    /// Agency id (DanMarc2 `001 *b`, MARC 21 control field `003`)
    pub agency_id: String,
}

impl RecordIdentifier {
    /// Identifier with both parts set to [`UNKNOWN_IDENTIFIER`].
    #[must_use]
    pub fn unknown() -> Self {
        RecordIdentifier {
            record_id: UNKNOWN_IDENTIFIER.to_string(),
            agency_id: UNKNOWN_IDENTIFIER.to_string(),
        }
    }
}

impl fmt::Display for RecordIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.record_id, self.agency_id)
    }
}

/// Returns true for tags `000`-`009`, which may be stored as control fields.
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.starts_with("00") && tag.chars().all(|c| c.is_ascii_digit())
}

impl Record {
    /// Create a new MARC record with the given leader
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            control_fields: IndexMap::new(),
            fields: Vec::new(),
        }
    }

    /// Add a control field (000-009)
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.control_fields.insert(tag, value);
    }

    /// Add a control field using string slices
    pub fn add_control_field_str(&mut self, tag: &str, value: &str) {
        self.add_control_field(tag.to_string(), value.to_string());
    }

    /// Get a control field value
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields
            .get(tag)
            .map(std::string::String::as_str)
    }

    /// Add a data field
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Iterate over the fields with a given tag
    pub fn get_fields<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.tag == tag)
    }

    /// Get first field with a given tag
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Iterate over all data fields in insertion order
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Iterate over all control fields as `(tag, value)` pairs
    pub fn control_fields_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.control_fields
            .iter()
            .map(|(tag, value)| (tag.as_str(), value.as_str()))
    }

    /// True when the record has neither control nor data fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.control_fields.is_empty() && self.fields.is_empty()
    }

    /// Extract the natural identifier of this record.
    ///
    /// A data field `001` wins (`*a` record id, `*b` agency); otherwise the
    /// control fields `001` and `003` are used. Never fails.
    #[must_use]
    pub fn identifier(&self) -> RecordIdentifier {
        let (record_id, agency_id) = match self.get_field("001") {
            Some(field) => (field.get_subfield('a'), field.get_subfield('b')),
            None => (
                self.get_control_field("001"),
                self.get_control_field("003"),
            ),
        };

        let or_unknown = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN_IDENTIFIER)
                .to_string()
        };

        RecordIdentifier {
            record_id: or_unknown(record_id),
            agency_id: or_unknown(agency_id),
        }
    }
}

impl Field {
    /// Create a new data field
    #[must_use]
    pub fn new(tag: String, indicator1: char, indicator2: char) -> Self {
        Field {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Add a subfield
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Add a subfield using a string slice
    pub fn add_subfield_str(&mut self, code: char, value: &str) {
        self.add_subfield(code, value.to_string());
    }

    /// Get first value for a subfield code
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Iterate over all subfields
    pub fn subfields(&self) -> impl Iterator<Item = &Subfield> {
        self.subfields.iter()
    }
}
