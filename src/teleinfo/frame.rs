//! # Teleinfo Frame Assembly
//!
//! The meter repeats one frame every second or so:
//!
//! ```text
//! STX LF group CR LF group CR ... LF group CR ETX
//! ```
//!
//! `FrameAssembler` consumes it one line at a time. It discards everything until
//! the first STX, then stores each group whose checksum validates. A line
//! carrying ETX closes the frame; the next frame starts accumulating right away.
//!
//! Every line produces a [`LineReport`]: what happened to its group, and the
//! completed frame if the line closed one. Nothing in here propagates a per-line
//! error; bad groups are reported, logged and skipped.

use crate::constants::{TIC_END_OF_FRAME, TIC_FIELD_ADDRESS, TIC_START_OF_FRAME};
use crate::error::TeleinfoError;
use crate::logging::{log_line_hex, LogThrottle};
use crate::teleinfo::field::{FieldTable, FieldValue};
use crate::teleinfo::line::{is_blank, parse_line};
use crate::{log_debug_throttled, log_warn_throttled};
use serde::Serialize;
use std::collections::BTreeMap;

/// One telemetry snapshot: label to typed value. The last write for a label wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Frame {
    fields: BTreeMap<String, FieldValue>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Removes the meter address, which must never leave the process.
    ///
    /// A frame without it is incomplete and must not be persisted.
    pub fn strip_address(&mut self) -> Result<FieldValue, TeleinfoError> {
        self.fields
            .remove(TIC_FIELD_ADDRESS)
            .ok_or(TeleinfoError::MissingAddress)
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Frame {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Frame {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Assembler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// No frame in progress; lines are discarded until a start-of-frame byte.
    Seeking,
    /// Inside a frame; groups are accumulated.
    Accumulating,
}

/// What happened to the group carried by one line.
#[derive(Debug)]
pub enum LineOutcome {
    /// Nothing to store: framing-only line, or still seeking a frame start.
    Ignored,
    /// The group validated and was stored under this label.
    Stored(String),
    /// The group was dropped.
    Rejected(TeleinfoError),
}

/// Result of feeding one line to the assembler.
#[derive(Debug)]
pub struct LineReport {
    pub outcome: LineOutcome,
    /// Set when the line closed a frame. `Err(MissingAddress)` means the frame
    /// was discarded.
    pub completed: Option<Result<Frame, TeleinfoError>>,
}

impl LineReport {
    fn ignored() -> Self {
        LineReport {
            outcome: LineOutcome::Ignored,
            completed: None,
        }
    }
}

/// Counters kept by the assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub lines: u64,
    pub fields_stored: u64,
    pub checksum_errors: u64,
    pub malformed_lines: u64,
    pub decode_errors: u64,
    pub frames_completed: u64,
    pub frames_discarded: u64,
}

/// Line-by-line frame assembler.
#[derive(Debug)]
pub struct FrameAssembler {
    table: FieldTable,
    state: AssemblerState,
    current: Frame,
    stats: AssemblerStats,
    warn_throttle: LogThrottle,
    debug_throttle: LogThrottle,
}

impl FrameAssembler {
    pub fn new(table: FieldTable) -> Self {
        FrameAssembler {
            table,
            state: AssemblerState::Seeking,
            current: Frame::new(),
            stats: AssemblerStats::default(),
            // A garbled link produces one error per line; keep it to a few per minute.
            warn_throttle: LogThrottle::new(60_000, 10),
            debug_throttle: LogThrottle::new(60_000, 10),
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// The frame being accumulated.
    pub fn current(&self) -> &Frame {
        &self.current
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// Drops the frame in progress and goes back to seeking a start byte.
    pub fn reset(&mut self) {
        self.state = AssemblerState::Seeking;
        self.current = Frame::new();
    }

    /// Feeds one raw line, including its trailing control bytes.
    pub fn push_line(&mut self, line: &[u8]) -> LineReport {
        self.stats.lines += 1;

        let group = match self.state {
            AssemblerState::Seeking => {
                // Only what follows the last STX belongs to the new frame.
                let Some(start) = line.iter().rposition(|b| *b == TIC_START_OF_FRAME) else {
                    return LineReport::ignored();
                };
                log::debug!("Start of frame found, accumulating");
                self.state = AssemblerState::Accumulating;
                self.current = Frame::new();
                &line[start + 1..]
            }
            AssemblerState::Accumulating => line,
        };

        let outcome = self.accept_group(group);
        let completed = group
            .contains(&TIC_END_OF_FRAME)
            .then(|| self.complete_frame());

        LineReport { outcome, completed }
    }

    fn accept_group(&mut self, group: &[u8]) -> LineOutcome {
        if is_blank(group) {
            return LineOutcome::Ignored;
        }

        let field = match parse_line(group) {
            Ok(field) => field,
            Err(e) => {
                self.stats.malformed_lines += 1;
                log_warn_throttled!(self.warn_throttle, "Skipping line: {e}");
                log_line_hex("Skipped line", group);
                return LineOutcome::Rejected(e);
            }
        };

        if let Err(e) = field.verify() {
            self.stats.checksum_errors += 1;
            log_debug_throttled!(
                self.debug_throttle,
                "{} {}: {e}",
                field.name,
                field.value
            );
            return LineOutcome::Rejected(e);
        }

        match self.table.decode(&field.name, &field.value) {
            Ok(value) => {
                self.stats.fields_stored += 1;
                self.current.insert(field.name.clone(), value);
                LineOutcome::Stored(field.name)
            }
            Err(e) => {
                self.stats.decode_errors += 1;
                log_warn_throttled!(self.warn_throttle, "{e}");
                LineOutcome::Rejected(e)
            }
        }
    }

    fn complete_frame(&mut self) -> Result<Frame, TeleinfoError> {
        let mut frame = std::mem::take(&mut self.current);
        match frame.strip_address() {
            Ok(_) => {
                self.stats.frames_completed += 1;
                log::debug!("Frame complete with {} fields", frame.len());
                Ok(frame)
            }
            Err(e) => {
                self.stats.frames_discarded += 1;
                log::warn!("Discarding frame of {} fields: {e}", frame.len());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teleinfo::checksum::checksum;

    fn group(name: &str, value: &str) -> Vec<u8> {
        let text = format!("{name} {value}");
        format!("{text} {}\r\n", checksum(text.as_bytes())).into_bytes()
    }

    fn with_prefix(prefix: &[u8], line: Vec<u8>) -> Vec<u8> {
        let mut out = prefix.to_vec();
        out.extend(line);
        out
    }

    fn close(mut line: Vec<u8>) -> Vec<u8> {
        // "...CR LF" becomes "...CR ETX STX LF"
        line.pop();
        line.extend_from_slice(&[0x03, 0x02, b'\n']);
        line
    }

    #[test]
    fn test_seeking_discards_until_start() {
        let mut asm = FrameAssembler::new(FieldTable::default());
        let report = asm.push_line(&group("PAPP", "01070"));
        assert!(matches!(report.outcome, LineOutcome::Ignored));
        assert_eq!(asm.state(), AssemblerState::Seeking);
        assert!(asm.current().is_empty());
    }

    #[test]
    fn test_tail_of_partial_frame_is_not_kept() {
        let mut asm = FrameAssembler::new(FieldTable::default());
        let report = asm.push_line(&close(group("PTEC", "HP..")));
        assert!(matches!(report.outcome, LineOutcome::Ignored));
        assert!(report.completed.is_none());
        assert_eq!(asm.state(), AssemblerState::Accumulating);
        assert!(asm.current().is_empty());
    }

    #[test]
    fn test_full_frame() {
        let mut asm = FrameAssembler::new(FieldTable::default());
        asm.push_line(b"\x02\n");
        assert_eq!(asm.state(), AssemblerState::Accumulating);

        asm.push_line(&group("ADCO", "000000000000"));
        asm.push_line(&group("PAPP", "01070"));
        assert_eq!(asm.current().len(), 2);

        let report = asm.push_line(&close(group("PTEC", "HP..")));
        assert!(matches!(report.outcome, LineOutcome::Stored(ref n) if n == "PTEC"));
        let frame = report.completed.unwrap().unwrap();
        assert!(!frame.contains("ADCO"));
        assert_eq!(frame.get("PAPP"), Some(&FieldValue::Integer(1070)));
        assert_eq!(frame.get("PTEC"), Some(&FieldValue::from("HP..")));
        assert!(asm.current().is_empty());
        assert_eq!(asm.state(), AssemblerState::Accumulating);
    }

    #[test]
    fn test_bad_checksum_is_skipped() {
        let mut asm = FrameAssembler::new(FieldTable::default());
        asm.push_line(&with_prefix(b"\x02", group("ADCO", "000000000000")));
        let report = asm.push_line(b"PAPP 01070 *\r\n");
        assert!(matches!(
            report.outcome,
            LineOutcome::Rejected(TeleinfoError::InvalidChecksum { .. })
        ));
        assert!(!asm.current().contains("PAPP"));
        assert_eq!(asm.stats().checksum_errors, 1);
    }

    #[test]
    fn test_missing_address_discards_frame() {
        let mut asm = FrameAssembler::new(FieldTable::default());
        asm.push_line(b"\x02\n");
        asm.push_line(&group("PAPP", "01070"));
        let report = asm.push_line(&close(group("PTEC", "HP..")));
        assert!(matches!(
            report.completed,
            Some(Err(TeleinfoError::MissingAddress))
        ));
        assert_eq!(asm.stats().frames_discarded, 1);
        assert!(asm.current().is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let mut asm = FrameAssembler::new(FieldTable::default());
        asm.push_line(b"\x02\n");
        asm.push_line(&group("PAPP", "01070"));
        asm.push_line(&group("PAPP", "01080"));
        assert_eq!(asm.current().get("PAPP"), Some(&FieldValue::Integer(1080)));
    }

    #[test]
    fn test_decode_error_is_recoverable() {
        let mut asm = FrameAssembler::new(FieldTable::default());
        asm.push_line(b"\x02\n");
        let report = asm.push_line(&group("PAPP", "0107A"));
        assert!(matches!(
            report.outcome,
            LineOutcome::Rejected(TeleinfoError::FieldDecodeError { .. })
        ));
        let report = asm.push_line(&group("IINST", "005"));
        assert!(matches!(report.outcome, LineOutcome::Stored(_)));
    }

    #[test]
    fn test_checksum_noise_does_not_hide_warnings() {
        let mut asm = FrameAssembler::new(FieldTable::default());
        asm.push_line(b"\x02\n");
        for _ in 0..10 {
            asm.push_line(b"PAPP 01070 *\r\n");
        }
        asm.push_line(&group("PAPP", "0107A"));
        asm.push_line(b"NOSPACE\r\n");

        assert_eq!(asm.stats().checksum_errors, 10);
        assert_eq!(asm.stats().decode_errors, 1);
        assert_eq!(asm.stats().malformed_lines, 1);
        assert_eq!(asm.warn_throttle.suppressed(), 0);
    }

    #[test]
    fn test_reset() {
        let mut asm = FrameAssembler::new(FieldTable::default());
        asm.push_line(b"\x02\n");
        asm.push_line(&group("PAPP", "01070"));
        asm.reset();
        assert_eq!(asm.state(), AssemblerState::Seeking);
        assert!(asm.current().is_empty());
    }

    #[test]
    fn test_strip_address() {
        let mut frame: Frame = [
            ("ADCO", FieldValue::from("000000000000")),
            ("PAPP", FieldValue::Integer(1070)),
        ]
        .into_iter()
        .collect();
        assert_eq!(frame.strip_address().unwrap(), FieldValue::from("000000000000"));
        assert!(matches!(
            frame.strip_address(),
            Err(TeleinfoError::MissingAddress)
        ));
    }
}
