//! # Incremental Frame Assembly
//!
//! Accumulates arbitrarily split network chunks and extracts complete MPEG
//! frames as soon as all of their bytes have arrived.
//!
//! The backlog is a single growable buffer with a consumed-offset cursor.
//! Bytes before the cursor are never examined again and are dropped after
//! every extraction pass, so memory stays bounded by one partial frame plus
//! whatever the producer delivered since the last pass.

use super::header::{MpegFrameHeader, MpegFrameScanner};
use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, warn};

/// A complete frame cut out of the backlog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFrame {
    /// Absolute position of the frame's first byte in the input stream.
    pub stream_offset: u64,
    /// Decoded header
    pub header: MpegFrameHeader,
    /// Frame bytes, header included
    pub data: Bytes,
}

impl AssembledFrame {
    /// Byte range of this frame within the input stream.
    pub fn stream_range(&self) -> std::ops::Range<u64> {
        self.stream_offset..self.stream_offset + self.data.len() as u64
    }
}

/// Stateful backlog that turns chunks into frames.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    backlog: BytesMut,
    /// Offset within `backlog` where the next scan starts.
    cursor: usize,
    /// Stream offset of `backlog[0]`.
    base_offset: u64,
    received: u64,
    skipped: u64,
    frames: u64,
}

impl FrameAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the backlog.
    pub fn append(&mut self, chunk: &[u8]) {
        self.backlog.extend_from_slice(chunk);
        self.received += chunk.len() as u64;
    }

    /// Bytes received but not yet consumed.
    pub fn pending(&self) -> &[u8] {
        &self.backlog[self.cursor..]
    }

    /// Number of bytes received but not yet consumed.
    pub fn pending_len(&self) -> usize {
        self.backlog.len() - self.cursor
    }

    /// Consume `count` pending bytes without producing a frame (ID3 tag).
    ///
    /// Clamped to the number of pending bytes.
    pub fn discard(&mut self, count: usize) {
        let count = count.min(self.pending_len());
        self.cursor += count;
        self.skipped += count as u64;
        self.compact();
    }

    /// Extract every frame fully contained in the backlog.
    ///
    /// Stops at the first frame that extends past the available bytes; that
    /// frame stays pending and is completed by later appends. The sequence
    /// of extracted frames does not depend on how the input was split.
    pub fn extract_frames(&mut self) -> Vec<AssembledFrame> {
        let mut frames = Vec::new();

        loop {
            let Some(info) = MpegFrameScanner::scan(&self.backlog, self.cursor) else {
                // Nothing before the resume point can ever start a frame
                let resume = MpegFrameScanner::resume_offset(&self.backlog, self.cursor);
                self.skip_to(resume);
                break;
            };

            self.skip_to(info.offset);

            if info.end() > self.backlog.len() {
                break;
            }

            let frame = AssembledFrame {
                stream_offset: self.base_offset + info.offset as u64,
                header: info.header,
                data: Bytes::copy_from_slice(&self.backlog[info.offset..info.end()]),
            };
            self.cursor = info.end();
            frames.push(frame);
        }

        self.frames += frames.len() as u64;
        self.compact();
        frames
    }

    /// Header of the frame waiting for its remaining bytes, if the backlog
    /// starts with one.
    ///
    /// A located frame is never abandoned, so this is the header of the next
    /// frame [`extract_frames`](Self::extract_frames) will return.
    pub fn pending_header(&self) -> Option<MpegFrameHeader> {
        match self.pending() {
            [b0, b1, b2, b3, ..] => MpegFrameHeader::parse([*b0, *b1, *b2, *b3]).ok(),
            _ => None,
        }
    }

    /// Total bytes appended so far.
    pub fn bytes_received(&self) -> u64 {
        self.received
    }

    /// Bytes consumed without becoming part of a frame.
    pub fn bytes_skipped(&self) -> u64 {
        self.skipped
    }

    /// Frames extracted so far.
    pub fn frames_extracted(&self) -> u64 {
        self.frames
    }

    /// Stream offset of the first pending byte.
    pub fn stream_position(&self) -> u64 {
        self.base_offset + self.cursor as u64
    }

    fn skip_to(&mut self, offset: usize) {
        if offset <= self.cursor {
            return;
        }
        let gap = offset - self.cursor;
        if self.frames > 0 || gap > 1 {
            warn!(
                at = self.base_offset + self.cursor as u64,
                bytes = gap,
                "Skipping bytes while searching for frame sync"
            );
        }
        self.skipped += gap as u64;
        self.cursor = offset;
    }

    fn compact(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.backlog.advance(self.cursor);
        self.base_offset += self.cursor as u64;
        debug!(
            dropped = self.cursor,
            retained = self.backlog.len(),
            "Compacted frame backlog"
        );
        self.cursor = 0;
    }
}
