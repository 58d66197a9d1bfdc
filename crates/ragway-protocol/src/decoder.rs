//! Incremental frame decoder.
//!
//! Network reads do not respect line or UTF-8 boundaries, so incoming bytes
//! are carried over until a full line is available. `\n` never occurs inside
//! a multi-byte UTF-8 sequence, which makes splitting on the raw byte safe.

use tracing::warn;

use crate::frame::StreamFrame;

/// Turns arbitrary byte chunks into complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one delivery event; returns every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.carry.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.carry[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(frame) = decode_bytes(&self.carry[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.carry.drain(..start);
        frames
    }

    /// Flush a final line that arrived without a terminator.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        let rest = std::mem::take(&mut self.carry);
        decode_bytes(&rest).into_iter().collect()
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

fn decode_bytes(line: &[u8]) -> Option<StreamFrame> {
    let text = match std::str::from_utf8(line) {
        Ok(t) => t,
        Err(e) => {
            warn!("Skipping frame with invalid UTF-8: {}", e);
            return None;
        }
    };
    match StreamFrame::decode_line(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Skipping malformed frame: {}", e);
            None
        }
    }
}
