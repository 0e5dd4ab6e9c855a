//! Character set support for MARC input.
//!
//! Input can use any charset known to `encoding_rs` (UTF-8, Latin-1 and friends)
//! or DanMarc2, the Danish 8-bit MARC charset derived from ISO 5426:
//! - Bytes below 0x80 are ASCII
//! - Bytes 0xC0-0xDB are combining diacritics that **precede** the base letter
//! - A handful of high bytes map to letters like `æ`, `ø`, `Ł`
//!
//! DanMarc2 is format-sensitive: its line-format variant also knows the
//! `@XXXX` escape for arbitrary code points. That is why format sniffing never
//! decodes with DanMarc2 directly, see [`Charset::sniffing_charset`].

use crate::error::{MarcError, Result};
use crate::formats::MarcFormat;
use encoding_rs::Encoding;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Escape character of the DanMarc2 line format.
pub const DANMARC2_ESCAPE: char = '@';

/// Variant of the DanMarc2 charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DanMarc2Variant {
    /// Plain DanMarc2 as found in ISO 2709 and XML files
    Iso,
    /// DanMarc2 as written in line format, with `@XXXX` code point escapes
    LineFormat,
}

/// Character set used to decode raw input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// Any WHATWG encoding supported by `encoding_rs`
    Standard(&'static Encoding),
    /// The DanMarc2 charset
    DanMarc2(DanMarc2Variant),
}

impl Default for Charset {
    fn default() -> Self {
        Charset::utf8()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Charset::Standard(encoding) => write!(f, "{}", encoding.name()),
            Charset::DanMarc2(DanMarc2Variant::Iso) => write!(f, "DanMarc2"),
            Charset::DanMarc2(DanMarc2Variant::LineFormat) => write!(f, "DanMarc2 (line format)"),
        }
    }
}

impl Charset {
    /// UTF-8.
    #[must_use]
    pub fn utf8() -> Charset {
        Charset::Standard(encoding_rs::UTF_8)
    }

    /// Latin-1, the format-agnostic fallback used while sniffing.
    #[must_use]
    pub fn latin1() -> Charset {
        Charset::Standard(encoding_rs::WINDOWS_1252)
    }

    /// Look up a charset by label (`utf-8`, `latin1`, `iso-8859-1`, `danmarc2`, ...).
    ///
    /// # Errors
    ///
    /// Returns `MarcError::EncodingError` for an unknown label.
    pub fn from_label(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        let normalized = trimmed.to_ascii_lowercase().replace(['-', '_'], "");
        if normalized == "danmarc2" {
            return Ok(Charset::DanMarc2(DanMarc2Variant::Iso));
        }
        Encoding::for_label(trimmed.as_bytes())
            .map(Charset::Standard)
            .ok_or_else(|| MarcError::EncodingError(format!("Unknown charset: {label}")))
    }

    /// True when decoding depends on the record format being read.
    #[must_use]
    pub fn is_format_sensitive(&self) -> bool {
        matches!(self, Charset::DanMarc2(_))
    }

    /// Charset to decode a format-sniffing sample with.
    ///
    /// Format-sensitive charsets are replaced by Latin-1 so that format and
    /// charset never depend on each other.
    #[must_use]
    pub fn sniffing_charset(&self) -> Charset {
        if self.is_format_sensitive() {
            Charset::latin1()
        } else {
            *self
        }
    }

    /// Charset to construct a reader for `format` with.
    #[must_use]
    pub fn for_format(&self, format: MarcFormat) -> Charset {
        match (self, format) {
            (Charset::DanMarc2(_), MarcFormat::Line) => {
                Charset::DanMarc2(DanMarc2Variant::LineFormat)
            },
            _ => *self,
        }
    }

    /// Decode bytes, returning `None` if they are not valid in this charset.
    ///
    /// A multi-byte sequence cut off at the end of `bytes` counts as invalid.
    #[must_use]
    pub fn decode_strict(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Charset::Standard(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(std::borrow::Cow::into_owned),
            Charset::DanMarc2(variant) => Some(decode_danmarc2(bytes, *variant)),
        }
    }

    /// Decode bytes, replacing malformed sequences with U+FFFD.
    #[must_use]
    pub fn decode_lossy(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Standard(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
            Charset::DanMarc2(variant) => decode_danmarc2(bytes, *variant),
        }
    }
}

/// Combining diacritic for a DanMarc2 byte, if it is one.
fn danmarc2_combining(byte: u8) -> Option<char> {
    let mark = match byte {
        0xC0 => '\u{0309}', // hook above
        0xC1 => '\u{0300}', // grave
        0xC2 => '\u{0301}', // acute
        0xC3 => '\u{0302}', // circumflex
        0xC4 => '\u{0303}', // tilde
        0xC5 => '\u{0304}', // macron
        0xC6 => '\u{0306}', // breve
        0xC7 => '\u{0307}', // dot above
        0xC8 | 0xC9 => '\u{0308}',
        0xCA => '\u{030A}', // ring above
        0xCB => '\u{0315}',
        0xCC => '\u{0312}',
        0xCD => '\u{030B}', // double acute
        0xCE => '\u{031B}', // horn
        0xCF => '\u{030C}', // caron
        0xD0 => '\u{0327}', // cedilla
        0xD1 => '\u{031C}',
        0xD2 => '\u{0326}', // comma below
        0xD3 => '\u{0328}', // ogonek
        0xD4 => '\u{0325}', // ring below
        0xD5 => '\u{032E}', // breve below
        0xD6 => '\u{0323}', // dot below
        0xD7 => '\u{0324}',
        0xD8 => '\u{0332}', // low line
        0xD9 => '\u{0333}',
        0xDA => '\u{0329}',
        0xDB => '\u{032D}',
        _ => return None,
    };
    Some(mark)
}

/// Spacing character for a non-combining DanMarc2 byte.
fn danmarc2_spacing(byte: u8) -> char {
    match byte {
        0x00..=0x7F => byte as char,
        0xA1 => '¡',
        0xA3 => '£',
        0xA5 => '¥',
        0xA7 => '§',
        0xAB => '«',
        0xBB => '»',
        0xBF => '¿',
        0xE1 => 'Æ',
        0xE2 => 'Đ',
        0xE6 => 'Ĳ',
        0xE8 => 'Ł',
        0xE9 => 'Ø',
        0xEA => 'Œ',
        0xEC => 'Þ',
        0xF1 => 'æ',
        0xF2 => 'đ',
        0xF3 => 'ð',
        0xF5 => 'ı',
        0xF6 => 'ĳ',
        0xF8 => 'ł',
        0xF9 => 'ø',
        0xFA => 'œ',
        0xFB => 'ß',
        0xFC => 'þ',
        _ => '\u{FFFD}',
    }
}

/// Decode DanMarc2 bytes into NFC-normalized text.
fn decode_danmarc2(bytes: &[u8], variant: DanMarc2Variant) -> String {
    let mut decoded = String::with_capacity(bytes.len());
    let mut pending_marks: Vec<char> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];

        if let Some(mark) = danmarc2_combining(byte) {
            pending_marks.push(mark);
            i += 1;
            continue;
        }

        if variant == DanMarc2Variant::LineFormat && byte == DANMARC2_ESCAPE as u8 {
            if bytes.get(i + 1) == Some(&(DANMARC2_ESCAPE as u8)) {
                // Escaped escape; leave it for the line parser
                decoded.push(DANMARC2_ESCAPE);
                decoded.push(DANMARC2_ESCAPE);
                decoded.extend(pending_marks.drain(..));
                i += 2;
                continue;
            }
            if let Some(ch) = bytes.get(i + 1..i + 5).and_then(parse_code_point) {
                decoded.push(ch);
                decoded.extend(pending_marks.drain(..));
                i += 5;
                continue;
            }
        }

        decoded.push(danmarc2_spacing(byte));
        decoded.extend(pending_marks.drain(..));
        i += 1;
    }

    // Trailing marks with no base letter
    decoded.extend(pending_marks);
    decoded.nfc().collect()
}

fn parse_code_point(hex: &[u8]) -> Option<char> {
    if !hex.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let text = std::str::from_utf8(hex).ok()?;
    u32::from_str_radix(text, 16).ok().and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label() {
        assert_eq!(Charset::from_label("UTF-8").unwrap(), Charset::utf8());
        assert_eq!(Charset::from_label("latin1").unwrap(), Charset::latin1());
        assert_eq!(
            Charset::from_label("DanMarc-2").unwrap(),
            Charset::DanMarc2(DanMarc2Variant::Iso)
        );
        assert!(Charset::from_label("klingon").is_err());
    }

    #[test]
    fn test_utf8_strict_rejects_truncated_sequence() {
        let bytes = "blåbær".as_bytes();
        // Cut in the middle of the two-byte 'æ'
        let cut = &bytes[..bytes.len() - 2];
        assert!(Charset::utf8().decode_strict(cut).is_none());
        assert_eq!(
            Charset::utf8().decode_strict(&bytes[..bytes.len() - 3]).as_deref(),
            Some("blåb")
        );
    }

    #[test]
    fn test_latin1_never_fails() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        assert!(Charset::latin1().decode_strict(&bytes).is_some());
    }

    #[test]
    fn test_danmarc2_combining_precedes_base() {
        // 0xC2 = acute, then 'e'
        let decoded = Charset::DanMarc2(DanMarc2Variant::Iso).decode_lossy(b"caf\xC2e");
        assert_eq!(decoded, "café");
    }

    #[test]
    fn test_danmarc2_special_letters() {
        let decoded =
            Charset::DanMarc2(DanMarc2Variant::Iso).decode_lossy(b"bl\xCAab\xF1r \xE9l");
        assert_eq!(decoded, "blåbær Øl");
    }

    #[test]
    fn test_danmarc2_line_format_code_point_escape() {
        let line = Charset::DanMarc2(DanMarc2Variant::LineFormat);
        assert_eq!(line.decode_lossy(b"@00e5 og @@ og @*"), "å og @@ og @*");

        let iso = Charset::DanMarc2(DanMarc2Variant::Iso);
        assert_eq!(iso.decode_lossy(b"@00e5"), "@00e5");
    }

    #[test]
    fn test_sniffing_charset_avoids_danmarc2() {
        let danmarc2 = Charset::DanMarc2(DanMarc2Variant::Iso);
        assert!(danmarc2.is_format_sensitive());
        assert_eq!(danmarc2.sniffing_charset(), Charset::latin1());
        assert_eq!(Charset::utf8().sniffing_charset(), Charset::utf8());
    }

    #[test]
    fn test_for_format_selects_line_variant() {
        let danmarc2 = Charset::DanMarc2(DanMarc2Variant::Iso);
        assert_eq!(
            danmarc2.for_format(MarcFormat::Line),
            Charset::DanMarc2(DanMarc2Variant::LineFormat)
        );
        assert_eq!(danmarc2.for_format(MarcFormat::Iso2709), danmarc2);
        assert_eq!(Charset::utf8().for_format(MarcFormat::Line), Charset::utf8());
    }
}
