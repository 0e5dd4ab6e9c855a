//! Format detection on realistic inputs plus property tests.

mod common;

use common::{danmarc2_lines, iso_danmarc_record, marc_lines, marcxchange_collection};
use marc_update::charset::DanMarc2Variant;
use marc_update::sniffer::FormatSniffer;
use marc_update::{Charset, MarcFormat};
use proptest::prelude::*;
use std::io::{Cursor, Read};

fn sniff_bytes(data: &[u8]) -> (MarcFormat, Vec<u8>) {
    let (format, mut input) = FormatSniffer::default()
        .sniff(Cursor::new(data.to_vec()), Charset::utf8())
        .unwrap();
    let mut replayed = Vec::new();
    input.read_to_end(&mut replayed).unwrap();
    (format, replayed)
}

#[test]
fn test_detects_each_format() {
    let cases = [
        (marcxchange_collection(&["1", "2"]).into_bytes(), MarcFormat::MarcXchange),
        (marc_lines(&["1", "2"]).into_bytes(), MarcFormat::Line),
        (danmarc2_lines(&["1", "2"]).into_bytes(), MarcFormat::DanMarc2Line),
        (iso_danmarc_record("1", "870970", "Title"), MarcFormat::Iso2709),
    ];
    for (data, expected) in cases {
        let (format, replayed) = sniff_bytes(&data);
        assert_eq!(format, expected);
        assert_eq!(replayed, data);
    }
}

#[test]
fn test_iso2709_with_dollar_in_data_is_not_line_format() {
    // The sample regexes are anchored at line starts, ISO records have none
    let data = iso_danmarc_record("1", "870970", "Costs $5");
    assert_eq!(sniff_bytes(&data).0, MarcFormat::Iso2709);
}

#[test]
fn test_large_input_replays_beyond_sample() {
    let ids: Vec<String> = (0..500).map(|i| i.to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let data = danmarc2_lines(&id_refs).into_bytes();
    assert!(data.len() > 10 * 1000);

    let (format, replayed) = sniff_bytes(&data);
    assert_eq!(format, MarcFormat::DanMarc2Line);
    assert_eq!(replayed, data);
}

#[test]
fn test_sniff_from_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(marc_lines(&["42"]).as_bytes()).unwrap();

    let reopened = std::fs::File::open(file.path()).unwrap();
    let (format, mut input) = FormatSniffer::new(64).sniff(reopened, Charset::utf8()).unwrap();
    assert_eq!(format, MarcFormat::Line);

    let mut text = String::new();
    input.read_to_string(&mut text).unwrap();
    assert_eq!(text, marc_lines(&["42"]));
}

#[test]
fn test_danmarc2_charset_hint_does_not_change_detection() {
    let data = danmarc2_lines(&["1"]).into_bytes();
    let sniffer = FormatSniffer::default();
    assert_eq!(
        sniffer.classify(&data, Charset::DanMarc2(DanMarc2Variant::Iso)),
        sniffer.classify(&data, Charset::latin1())
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_classification_is_idempotent(data in prop::collection::vec(any::<u8>(), 0..1500)) {
        let sniffer = FormatSniffer::default();
        for charset in [Charset::utf8(), Charset::latin1()] {
            prop_assert_eq!(sniffer.classify(&data, charset), sniffer.classify(&data, charset));
        }
    }

    #[test]
    fn prop_sniffing_is_non_destructive(
        data in prop::collection::vec(any::<u8>(), 0..3000),
        sample_size in 0usize..2000,
    ) {
        let (_, mut input) = FormatSniffer::new(sample_size)
            .sniff(Cursor::new(data.clone()), Charset::utf8())
            .unwrap();
        let mut replayed = Vec::new();
        input.read_to_end(&mut replayed).unwrap();
        prop_assert_eq!(replayed, data);
    }

    #[test]
    fn prop_leading_angle_bracket_is_xml(body in "[ \t\r\n]{0,4}<[a-zA-Z0-9 =\"/$*\n]{0,300}") {
        prop_assert_eq!(
            FormatSniffer::default().classify(body.as_bytes(), Charset::utf8()),
            MarcFormat::MarcXchange
        );
    }

    #[test]
    fn prop_dollar_line_anywhere_is_line_format(
        preamble in "[a-z ]{0,40}",
        tag in "[0-9]{3}",
        star_lines in 0usize..3,
    ) {
        let mut text = format!("{preamble}\n");
        for _ in 0..star_lines {
            text.push_str("650 00 *aemne\n");
        }
        text.push_str(&format!("{tag} 00 $avalue\n"));
        prop_assert_eq!(
            FormatSniffer::default().classify(text.as_bytes(), Charset::utf8()),
            MarcFormat::Line
        );
    }
}
