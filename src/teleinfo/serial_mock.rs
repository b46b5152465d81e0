//! Mock serial port implementation for testing
//!
//! This module provides a mock serial port that can be used to test
//! the Teleinfo line reader without requiring an actual meter.

use crate::constants::{TIC_END_OF_FRAME, TIC_START_OF_FRAME};
use crate::teleinfo::checksum::checksum;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Mock serial port that replays queued bytes, then reports end of stream.
#[derive(Clone, Default)]
pub struct MockSerialPort {
    /// Data to be read from the port (incoming)
    pub rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Simulated error for the next read
    pub next_error: Arc<Mutex<Option<io::Error>>>,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Encodes one group as the meter sends it: `LABEL SP VALUE SP CHECKSUM CR`.
pub fn encode_group(name: &str, value: &str) -> Vec<u8> {
    let text = format!("{name} {value}");
    let mut out = text.clone().into_bytes();
    out.push(b' ');
    out.push(checksum(text.as_bytes()) as u8);
    out.push(b'\r');
    out
}

/// Encodes a whole frame: `STX (LF group CR)* ETX`.
pub fn encode_frame(groups: &[(&str, &str)]) -> Vec<u8> {
    let mut out = vec![TIC_START_OF_FRAME];
    for (name, value) in groups {
        out.push(b'\n');
        out.extend(encode_group(name, value));
    }
    out.push(TIC_END_OF_FRAME);
    out
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue data to be read from the port
    pub fn queue_rx_data(&self, data: &[u8]) {
        locked(&self.rx_buffer).extend(data);
    }

    /// Queue a well-formed frame with valid checksums
    pub fn queue_frame(&self, groups: &[(&str, &str)]) {
        self.queue_rx_data(&encode_frame(groups));
    }

    /// Bytes still waiting to be read
    pub fn pending(&self) -> usize {
        locked(&self.rx_buffer).len()
    }

    /// Clear all buffers
    pub fn clear(&self) {
        locked(&self.rx_buffer).clear();
    }

    /// Set an error to be returned on the next read
    pub fn set_next_error(&self, error: io::Error) {
        *locked(&self.next_error) = Some(error);
    }
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(error) = locked(&self.next_error).take() {
            return Poll::Ready(Err(error));
        }

        let mut rx = locked(&self.rx_buffer);
        let available = rx.len().min(buf.remaining());
        if available > 0 {
            let data: Vec<u8> = rx.drain(..available).collect();
            buf.put_slice(&data);
        }

        // Nothing written into `buf` reads as end of stream.
        Poll::Ready(Ok(()))
    }
}
