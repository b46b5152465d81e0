#![no_main]

use libfuzzer_sys::fuzz_target;
use teleinfo_rs::teleinfo::line::parse_line;

fuzz_target!(|data: &[u8]| {
    if let Ok(field) = parse_line(data) {
        assert!(!field.name.is_empty());
        let _ = field.verify();
    }

    // Same bytes as the last group of a frame.
    let mut closed = data.to_vec();
    closed.extend_from_slice(b"\r\x03\x02\n");
    let _ = parse_line(&closed);
});
