//! # Ingest Pipeline
//!
//! The single loop of the service: wait for the store, then forever read a
//! frame, enrich it, and persist it. Everything runs sequentially on one task;
//! a slow store stalls reading, and the serial driver's buffer absorbs (or
//! drops) what arrives meanwhile.

use crate::constants::TIC_FIELD_TIMESTAMP;
use crate::enrich::FrameEnricher;
use crate::error::TeleinfoError;
use crate::logging::log_line_hex;
use crate::store::{ConnectionState, StoreSink, TimeSeriesStore};
use crate::teleinfo::field::FieldValue;
use crate::teleinfo::frame::Frame;
use crate::teleinfo::line::parse_line;
use crate::teleinfo::serial::{LineSource, TeleinfoReader};
use chrono::{DateTime, Local, NaiveTime, SubsecRound, Utc};

/// Wall clock, injectable for tests.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;

    /// Local time of day, used for the nightly window.
    fn local_time(&self) -> NaiveTime;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_time(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub local_time: NaiveTime,
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn local_time(&self) -> NaiveTime {
        self.local_time
    }
}

/// Reader, enricher and sink wired together.
pub struct Pipeline<S: LineSource, T: TimeSeriesStore> {
    reader: TeleinfoReader<S>,
    enricher: FrameEnricher,
    sink: StoreSink<T>,
    clock: Box<dyn Clock>,
}

impl<S: LineSource, T: TimeSeriesStore> Pipeline<S, T> {
    pub fn new(reader: TeleinfoReader<S>, enricher: FrameEnricher, sink: StoreSink<T>) -> Self {
        Pipeline {
            reader,
            enricher,
            sink,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn reader(&self) -> &TeleinfoReader<S> {
        &self.reader
    }

    pub fn sink(&self) -> &StoreSink<T> {
        &self.sink
    }

    /// Enriches and persists one completed frame.
    ///
    /// A recoverable write failure is logged and the frame is dropped; any
    /// other error is returned.
    pub async fn process_frame(&mut self, frame: Frame) -> Result<(), TeleinfoError> {
        let timestamp = self.clock.now().trunc_subsecs(0);
        let mut frame = self.enricher.enrich(frame, self.clock.local_time());
        let was_connected = self.sink.state() == ConnectionState::Connected;

        match self.sink.write(&frame, timestamp).await {
            Ok(_) => {
                if !was_connected {
                    let stats = self.sink.stats();
                    log::info!(
                        "Store write ok: {} frames written, {} dropped, {} connect retries",
                        stats.frames_written,
                        stats.frames_dropped,
                        stats.connect_retries
                    );
                }
            }
            Err(e) if e.is_recoverable() => {
                log::error!("Frame of {} fields dropped: {e}", frame.len());
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if log::log_enabled!(log::Level::Debug) {
            frame.insert(TIC_FIELD_TIMESTAMP, FieldValue::Integer(timestamp.timestamp()));
            match serde_json::to_string(&frame) {
                Ok(json) => log::debug!("{json}"),
                Err(e) => log::debug!("{frame:?} ({e})"),
            }
        }
        Ok(())
    }

    /// Runs until the line source ends or fails.
    ///
    /// Blocks on the store connection gate first. Recoverable errors are
    /// logged and skipped. Returns `Ok(())` when the source is exhausted.
    pub async fn run(&mut self) -> Result<(), TeleinfoError> {
        self.sink.ensure_connected().await?;

        loop {
            match self.reader.next_frame().await {
                Ok(frame) => self.process_frame(frame).await?,
                Err(TeleinfoError::EndOfStream) => {
                    log::info!("Line source exhausted");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => log::warn!("Skipping: {e}"),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Per-line checksum tally produced by [`check_lines`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub lines: u64,
    pub valid: u64,
    pub invalid: u64,
    pub malformed: u64,
}

/// Reads lines and logs whether each group's checksum validates, without
/// assembling frames or touching the store.
///
/// Stops after `limit` lines, or when the source ends.
pub async fn check_lines<S: LineSource>(
    source: &mut S,
    limit: Option<u64>,
) -> Result<CheckSummary, TeleinfoError> {
    let mut summary = CheckSummary::default();

    while limit.map_or(true, |l| summary.lines < l) {
        let line = match source.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => continue,
            Err(TeleinfoError::EndOfStream) => break,
            Err(e) if e.is_recoverable() => {
                log::warn!("{e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        summary.lines += 1;

        match parse_line(&line) {
            Ok(field) => match field.verify() {
                Ok(()) => {
                    summary.valid += 1;
                    log::info!("checksum ok: {} {}", field.name, field.value);
                }
                Err(e) => {
                    summary.invalid += 1;
                    log::warn!("{} {}: {e}", field.name, field.value);
                }
            },
            Err(e) => {
                summary.malformed += 1;
                log::warn!("{e}");
                log_line_hex("Malformed line", &line);
            }
        }
    }

    Ok(summary)
}
