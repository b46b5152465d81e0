//! # Teleinfo Line Parsing
//!
//! One line read from the port holds one group:
//!
//! ```text
//! [STX] LABEL SP VALUE SP CHECKSUM CR LF
//! ```
//!
//! The last group of a frame is followed by ETX and, when the meter keeps
//! talking, by the STX of the next frame before the LF that ends the line.
//!
//! The checksum can itself be a space, so the line is not split on "the last
//! space". The checksum is taken at a fixed offset from the end (after removing
//! an ETX STX pair), then the remaining prefix is split on its first space.

use crate::constants::{
    TIC_CARRIAGE_RETURN, TIC_CHECKSUM_OFFSET_FROM_END, TIC_END_OF_FRAME, TIC_FRAME_BOUNDARY,
    TIC_LINE_FEED, TIC_SEPARATOR, TIC_START_OF_FRAME,
};
use crate::error::TeleinfoError;
use crate::teleinfo::checksum::verify_field;

/// A group split into its parts, checksum not yet verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLine {
    pub name: String,
    pub value: String,
    pub checksum: char,
}

impl FieldLine {
    /// Verifies the checksum over `name SP value`.
    pub fn verify(&self) -> Result<(), TeleinfoError> {
        verify_field(&self.name, &self.value, self.checksum)
    }
}

fn is_control(c: char) -> bool {
    matches!(c as u32, 0x02 | 0x03 | 0x0A | 0x0D)
}

/// True when the line carries nothing but framing bytes and whitespace.
pub fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| {
        matches!(
            *b,
            TIC_START_OF_FRAME | TIC_END_OF_FRAME | TIC_LINE_FEED | TIC_CARRIAGE_RETURN | TIC_SEPARATOR
        )
    })
}

/// Removes every ETX STX pair from `text`.
fn strip_frame_boundary(text: &str) -> String {
    let boundary: String = TIC_FRAME_BOUNDARY.iter().map(|b| char::from(*b)).collect();
    text.replace(&boundary, "")
}

/// Splits one raw line into label, value and checksum.
pub fn parse_line(line: &[u8]) -> Result<FieldLine, TeleinfoError> {
    let text = std::str::from_utf8(line).map_err(|_| TeleinfoError::InvalidUtf8)?;
    let stripped = strip_frame_boundary(text);

    let (checksum_at, checksum) = stripped
        .char_indices()
        .rev()
        .nth(TIC_CHECKSUM_OFFSET_FROM_END - 1)
        .ok_or_else(|| TeleinfoError::MalformedLine(format!("too short: {stripped:?}")))?;

    let prefix = stripped[..checksum_at].trim_start_matches(is_control);
    let body = prefix.strip_suffix(char::from(TIC_SEPARATOR)).ok_or_else(|| {
        TeleinfoError::MalformedLine(format!("no separator before checksum: {stripped:?}"))
    })?;

    let (name, value) = body
        .split_once(char::from(TIC_SEPARATOR))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| TeleinfoError::MalformedLine(format!("fewer than two tokens: {body:?}")))?;

    Ok(FieldLine {
        name: name.to_string(),
        value: value.to_string(),
        checksum,
    })
}
