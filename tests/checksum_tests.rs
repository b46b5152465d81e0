//! Checksum tests against groups captured from a Linky meter.

use teleinfo_rs::teleinfo::checksum::{checksum, validate, verify_field};
use teleinfo_rs::TeleinfoError;

/// Groups as they appear on the wire: label, value, checksum.
const CAPTURED: &[(&str, &str, char)] = &[
    ("ADCO", "000000000000", 'W'),
    ("OPTARIF", "BASE", '0'),
    ("PAPP", "01070", ')'),
];

#[test]
fn test_captured_groups_validate() {
    for (name, value, expected) in CAPTURED {
        let text = format!("{name} {value}");
        assert_eq!(checksum(text.as_bytes()), *expected, "{text}");
        assert!(validate(&text, *expected));
        assert!(verify_field(name, value, *expected).is_ok());
    }
}

#[test]
fn test_wrong_checksum_reports_both_chars() {
    match verify_field("PAPP", "01070", '*') {
        Err(TeleinfoError::InvalidChecksum { expected, received }) => {
            assert_eq!(expected, ')');
            assert_eq!(received, '*');
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_empty_input() {
    assert_eq!(checksum(b""), ' ');
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_checksum_is_printable(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let c = checksum(&data) as u32;
            prop_assert!((0x20..=0x5F).contains(&c));
        }

        #[test]
        fn prop_own_checksum_validates(name in "[A-Z]{1,8}", value in "[0-9A-Za-z.]{1,12}") {
            let text = format!("{name} {value}");
            let c = checksum(text.as_bytes());
            prop_assert!(validate(&text, c));
            prop_assert!(verify_field(&name, &value, c).is_ok());
        }

        #[test]
        fn prop_single_byte_change_is_detected(value in "[0-9]{5}", pos in 0usize..5) {
            let text = format!("PAPP {value}");
            let c = checksum(text.as_bytes());
            let mut changed = text.into_bytes();
            let idx = 5 + pos;
            changed[idx] = if changed[idx] == b'9' { b'0' } else { changed[idx] + 1 };
            let changed = String::from_utf8(changed).unwrap();
            prop_assert!(!validate(&changed, c));
        }

        #[test]
        fn prop_validate_iff_checksum_matches(text in any::<String>(), c in 0x20u8..0x60) {
            let c = c as char;
            prop_assert_eq!(validate(&text, c), c == checksum(text.as_bytes()));
        }
    }
}
