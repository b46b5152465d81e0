//! # Teleinfo Checksum
//!
//! Every group carries a one-character checksum: the byte sum of
//! `LABEL SP VALUE`, masked to its low 6 bits, plus 0x20 so the result is
//! always printable (it can legitimately be a space).

use crate::constants::{TIC_CHECKSUM_MASK, TIC_CHECKSUM_PRINTABLE_OFFSET};
use crate::error::TeleinfoError;

/// Computes the checksum character of `data`.
pub fn checksum(data: &[u8]) -> char {
    let sum = data
        .iter()
        .fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b)));
    // Masked to 6 bits, so the result is always in 0x20..=0x5F.
    char::from(((sum & TIC_CHECKSUM_MASK) + TIC_CHECKSUM_PRINTABLE_OFFSET) as u8)
}

/// Returns true when `checksum_char` matches the checksum of `field_text`.
///
/// `field_text` is the label, one space, and the raw value exactly as received.
pub fn validate(field_text: &str, checksum_char: char) -> bool {
    checksum(field_text.as_bytes()) == checksum_char
}

/// Verifies the checksum of one `name`/`value` group.
pub fn verify_field(name: &str, value: &str, received: char) -> Result<(), TeleinfoError> {
    let mut text = Vec::with_capacity(name.len() + value.len() + 1);
    text.extend_from_slice(name.as_bytes());
    text.push(b' ');
    text.extend_from_slice(value.as_bytes());

    let expected = checksum(&text);
    if expected != received {
        return Err(TeleinfoError::InvalidChecksum { expected, received });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_groups() {
        assert_eq!(checksum(b"PAPP 01070"), ')');
        assert_eq!(checksum(b"ADCO 000000000000"), 'W');
        assert_eq!(checksum(b"OPTARIF BASE"), '0');
    }

    #[test]
    fn test_checksum_can_be_space() {
        // 'A' (0x41) + '?' (0x3F) = 0x80, masked to 0, plus 0x20 is a space.
        assert_eq!(checksum(b"A?"), ' ');
    }

    #[test]
    fn test_validate() {
        assert!(validate("PAPP 01070", ')'));
        assert!(!validate("PAPP 01071", ')'));
        assert!(!validate("PAPP 01070", '*'));
    }

    #[test]
    fn test_verify_field_reports_both_chars() {
        match verify_field("PAPP", "01070", 'x') {
            Err(TeleinfoError::InvalidChecksum { expected, received }) => {
                assert_eq!(expected, ')');
                assert_eq!(received, 'x');
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(verify_field("PAPP", "01070", ')').is_ok());
    }
}
