//! Unit tests for the logging functionality in the `teleinfo-rs` crate.

use teleinfo_rs::logging::{
    init_logger, log_debug, log_error, log_info, log_line_hex, log_warn, LogThrottle,
};
use teleinfo_rs::{log_debug_throttled, log_warn_throttled};

/// Tests that the logging helpers do not panic.
#[test]
fn test_logging() {
    log_error("This is an error message");
    log_warn("This is a warning message");
    log_info("This is an info message");
    log_debug("This is a debug message");
    log_line_hex("Line", b"PAPP 01070 )\r\x03\x02\n");
    log_line_hex("Long line", &[0x41; 200]);
}

/// Tests that the logger can be initialized more than once.
#[test]
fn test_init_logger() {
    init_logger();
    init_logger();
}

#[test]
fn test_throttled_macro() {
    let mut throttle = LogThrottle::new(60_000, 2);
    for i in 0..5 {
        log_warn_throttled!(throttle, "checksum error {i}");
    }
    assert_eq!(throttle.suppressed(), 3);
}

#[test]
fn test_debug_throttle_untouched_when_debug_is_off() {
    init_logger();
    if log::log_enabled!(log::Level::Debug) {
        return;
    }
    let mut throttle = LogThrottle::new(60_000, 2);
    for i in 0..5 {
        log_debug_throttled!(throttle, "checksum error {i}");
    }
    assert_eq!(throttle.suppressed(), 0);
    assert!(throttle.allow());
}
