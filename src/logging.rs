//! # Logging
//!
//! `env_logger` backend for the `log` facade, small level helpers, and a
//! throttle for the per-line protocol errors a noisy serial link produces.

use log::{debug, error, info, log_enabled, warn, Level, LevelFilter};
use std::time::{Duration, Instant};

/// Initializes the logger with the `env_logger` crate.
///
/// Defaults to `info` when `RUST_LOG` is unset.
pub fn init_logger() {
    init_logger_with_level(LevelFilter::Info);
}

/// Initializes the logger with a default level that `RUST_LOG` still overrides.
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_logger_with_level(default_level: LevelFilter) {
    let env = env_logger::Env::default().default_filter_or(default_level.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}

/// Log raw line bytes in hex for debugging.
///
/// Control bytes (STX/ETX/CR/LF) are invisible in text logs, so malformed
/// lines are dumped as hex instead.
pub fn log_line_hex(prefix: &str, data: &[u8]) {
    const MAX_LOG_BYTES: usize = 64;

    if !log_enabled!(Level::Debug) {
        return;
    }

    let shown = &data[..data.len().min(MAX_LOG_BYTES)];
    let suffix = if data.len() > MAX_LOG_BYTES {
        format!(" ... ({} bytes total)", data.len())
    } else {
        String::new()
    };

    debug!("{prefix}: {}{suffix}", hex::encode(shown));
}

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    window: Duration,
    cap: u32,
    count: u32,
    suppressed: u32,
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with time window and message cap
    ///
    /// # Examples
    /// ```rust
    /// use teleinfo_rs::logging::LogThrottle;
    ///
    /// // Allow 5 messages per minute
    /// let mut throttle = LogThrottle::new(60_000, 5);
    /// assert!(throttle.allow());
    /// ```
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            cap,
            count: 0,
            suppressed: 0,
            t0: Instant::now(),
        }
    }

    /// Check if logging is allowed (resets counter after window expires)
    ///
    /// When a new window opens after messages were dropped, a single warning
    /// reports how many were suppressed.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.t0) > self.window {
            if self.suppressed > 0 {
                warn!("{} log messages suppressed", self.suppressed);
            }
            self.t0 = now;
            self.count = 0;
            self.suppressed = 0;
        }

        self.count += 1;
        if self.count <= self.cap {
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Number of messages dropped in the current window
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }

    /// Reset the throttle (start new window immediately)
    pub fn reset(&mut self) {
        self.t0 = Instant::now();
        self.count = 0;
        self.suppressed = 0;
    }
}

/// Log a warning with throttling
#[macro_export]
macro_rules! log_warn_throttled {
    ($throttle:expr, $($arg:tt)*) => {
        if $throttle.allow() {
            log::warn!($($arg)*);
        }
    };
}

/// Log a debug message with throttling
///
/// The throttle budget is only spent when debug logging is enabled.
#[macro_export]
macro_rules! log_debug_throttled {
    ($throttle:expr, $($arg:tt)*) => {
        if log::log_enabled!(log::Level::Debug) && $throttle.allow() {
            log::debug!($($arg)*);
        }
    };
}
