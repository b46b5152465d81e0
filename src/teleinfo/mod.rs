//! The teleinfo module contains the components responsible for the Teleinfo (TIC)
//! protocol itself: checksum validation, field typing, line parsing, frame
//! assembly, and the serial line source that feeds them.

pub mod checksum;
pub mod field;
pub mod frame;
pub mod line;
pub mod serial;
pub mod serial_mock;

pub use checksum::{checksum, validate, verify_field};
pub use field::{FieldKind, FieldProfile, FieldTable, FieldValue};
pub use frame::{AssemblerState, AssemblerStats, Frame, FrameAssembler, LineOutcome, LineReport};
pub use line::{parse_line, FieldLine};
pub use serial::{LineReader, LineSource, Parity, SerialConfig, TeleinfoReader};
