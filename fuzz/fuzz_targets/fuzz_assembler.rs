#![no_main]

use libfuzzer_sys::fuzz_target;
use teleinfo_rs::teleinfo::frame::AssemblerState;
use teleinfo_rs::{FieldTable, FrameAssembler};

fuzz_target!(|data: &[u8]| {
    let mut asm = FrameAssembler::new(FieldTable::default());
    for line in data.split_inclusive(|b| *b == b'\n') {
        let report = asm.push_line(line);
        if let Some(Ok(frame)) = report.completed {
            assert!(!frame.contains("ADCO"));
            assert!(asm.current().is_empty());
        }
    }
    if asm.state() == AssemblerState::Seeking {
        assert!(asm.current().is_empty());
    }
});
