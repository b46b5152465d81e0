//! # Teleinfo Serial Communication
//!
//! This module provides the line source for the Teleinfo protocol: opening the
//! serial port in 7-bit mode, reading LF-delimited lines with a bounded timeout,
//! and driving the [`FrameAssembler`] until a frame completes.
//!
//! The port is hidden behind [`LineSource`] so tests can feed bytes from a
//! [`MockSerialPort`](crate::teleinfo::serial_mock::MockSerialPort) instead.

use crate::constants::{
    TIC_DEFAULT_BAUDRATE, TIC_DEFAULT_PORT, TIC_DEFAULT_READ_TIMEOUT_SECS, TIC_LINE_FEED,
};
use crate::error::TeleinfoError;
use crate::teleinfo::field::FieldTable;
use crate::teleinfo::frame::{Frame, FrameAssembler, LineReport};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;

/// Longest line accepted; anything longer is dropped as noise up to the next LF.
const MAX_PENDING_LINE: usize = 256;

/// Serial parity. Historic-mode meters talk 7E1; some USB dongles strip the
/// parity bit and expose 7N1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        }
    }
}

/// Configuration for serial connection. Word size is always 7 bits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baudrate: u32,
    pub parity: Parity,
    pub stop_bits: u8,
    pub timeout_secs: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: TIC_DEFAULT_PORT.to_string(),
            baudrate: TIC_DEFAULT_BAUDRATE,
            parity: Parity::None,
            stop_bits: 1,
            timeout_secs: TIC_DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn stop_bits(&self) -> Result<tokio_serial::StopBits, TeleinfoError> {
        match self.stop_bits {
            1 => Ok(tokio_serial::StopBits::One),
            2 => Ok(tokio_serial::StopBits::Two),
            n => Err(TeleinfoError::ConfigError(format!("unsupported stop bits: {n}"))),
        }
    }
}

/// Anything that yields raw Teleinfo lines.
#[async_trait::async_trait]
pub trait LineSource: Send {
    /// Reads one line including its trailing control bytes.
    ///
    /// `Ok(None)` means nothing complete arrived within the read timeout.
    /// `Err(EndOfStream)` means the source is exhausted.
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>, TeleinfoError>;
}

/// LF-delimited line reader over any async byte stream.
pub struct LineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    overflowed: bool,
    timeout: Duration,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        LineReader {
            reader: BufReader::new(inner),
            pending: Vec::with_capacity(64),
            overflowed: false,
            timeout,
        }
    }

    /// Appends bytes to `pending` until a line feed. Returns `false` at end
    /// of input.
    ///
    /// Cancel safe: state only changes between awaits.
    async fn fill_line(&mut self) -> std::io::Result<bool> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(false);
            }

            let (used, done) = match available.iter().position(|b| *b == TIC_LINE_FEED) {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };

            if !self.overflowed && self.pending.len() + used > MAX_PENDING_LINE {
                log::warn!(
                    "Dropping line longer than {MAX_PENDING_LINE} bytes ({} buffered)",
                    self.pending.len() + used
                );
                self.pending.clear();
                self.overflowed = true;
            }
            if !self.overflowed {
                self.pending.extend_from_slice(&available[..used]);
            }
            self.reader.consume(used);

            if done {
                if std::mem::take(&mut self.overflowed) {
                    continue;
                }
                return Ok(true);
            }
        }
    }
}

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for LineReader<R> {
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>, TeleinfoError> {
        // Bytes read before a timeout stay in `pending` and are completed next call.
        match timeout(self.timeout, self.fill_line()).await {
            Err(_) => Ok(None),
            Ok(Ok(true)) => Ok(Some(std::mem::take(&mut self.pending))),
            Ok(Ok(false)) if self.pending.is_empty() => Err(TeleinfoError::EndOfStream),
            Ok(Ok(false)) => Ok(Some(std::mem::take(&mut self.pending))),
            Ok(Err(e)) => Err(e.into()),
        }
    }
}

/// Opens the serial port described by `config` as a line source.
pub fn open_serial(
    config: &SerialConfig,
) -> Result<LineReader<tokio_serial::SerialStream>, TeleinfoError> {
    let port = tokio_serial::new(config.port.as_str(), config.baudrate)
        .data_bits(tokio_serial::DataBits::Seven)
        .stop_bits(config.stop_bits()?)
        .parity(config.parity.into())
        .timeout(config.timeout())
        .open_native_async()
        .map_err(|e| TeleinfoError::SerialPortError(format!("{}: {e}", config.port)))?;

    log::info!(
        "Teleinfo is reading on {} ({} baud, 7{}{})",
        config.port,
        config.baudrate,
        match config.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        },
        config.stop_bits
    );

    Ok(LineReader::new(port, config.timeout()))
}

/// Owns a line source and the assembler it drives.
pub struct TeleinfoReader<S: LineSource> {
    source: S,
    assembler: FrameAssembler,
}

impl<S: LineSource> TeleinfoReader<S> {
    pub fn new(source: S, table: FieldTable) -> Self {
        TeleinfoReader {
            source,
            assembler: FrameAssembler::new(table),
        }
    }

    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Reads and feeds one line. `Ok(None)` on read timeout.
    pub async fn step(&mut self) -> Result<Option<LineReport>, TeleinfoError> {
        let Some(line) = self.source.read_line().await? else {
            return Ok(None);
        };
        Ok(Some(self.assembler.push_line(&line)))
    }

    /// Reads lines until a frame completes with its address present.
    ///
    /// Frames discarded by the assembler are skipped; only source errors are
    /// returned.
    pub async fn next_frame(&mut self) -> Result<Frame, TeleinfoError> {
        loop {
            let Some(report) = self.step().await? else {
                continue;
            };
            if let Some(Ok(frame)) = report.completed {
                return Ok(frame);
            }
        }
    }
}
