// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker stdio multiplex framing.
//!
//! Non-TTY attach/log streams interleave stdout and stderr with an 8-byte
//! header: `[stream_type(1) | reserved(3) | length(4 big-endian)]`
//! followed by `length` payload bytes. The demultiplexer is incremental:
//! feed it arbitrary byte slices, collect whole frames as they complete.

use sv_core::StreamKind;
use thiserror::Error;

pub const HEADER_LEN: usize = 8;

const STREAM_STDIN: u8 = 0;
const STREAM_STDOUT: u8 = 1;
const STREAM_STDERR: u8 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("unknown stream type byte {0}")]
    UnknownStream(u8),
}

/// One complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioFrame {
    pub stream: StreamKind,
    pub payload: Vec<u8>,
}

/// Encode a payload with the engine wire header.
pub fn encode_frame(stream: StreamKind, payload: &[u8]) -> Vec<u8> {
    let stream_byte = match stream {
        StreamKind::Stdout => STREAM_STDOUT,
        StreamKind::Stderr => STREAM_STDERR,
    };
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(stream_byte);
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Incremental demultiplexer for the 8-byte header framing.
#[derive(Debug, Default)]
pub struct StdioDemux {
    buffer: Vec<u8>,
}

impl StdioDemux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every frame completed by this input.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<StdioFrame>, FramingError> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            if self.buffer.len() < HEADER_LEN {
                break;
            }
            let stream = match self.buffer[0] {
                // Stdin frames only occur on the write side; tolerate them
                // as stdout so a misbehaving engine cannot wedge the reader.
                STREAM_STDIN | STREAM_STDOUT => StreamKind::Stdout,
                STREAM_STDERR => StreamKind::Stderr,
                other => return Err(FramingError::UnknownStream(other)),
            };
            let len =
                u32::from_be_bytes([self.buffer[4], self.buffer[5], self.buffer[6], self.buffer[7]])
                    as usize;
            if self.buffer.len() < HEADER_LEN + len {
                break;
            }
            let payload = self.buffer[HEADER_LEN..HEADER_LEN + len].to_vec();
            self.buffer.drain(..HEADER_LEN + len);
            frames.push(StdioFrame { stream, payload });
        }
        Ok(frames)
    }

    /// Bytes still waiting for a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
