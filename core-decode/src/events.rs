//! # Synthesis Events
//!
//! Output protocol consumed by audio sinks and platform TTS callbacks.
//!
//! Every session produces, in order:
//!
//! ```text
//! Started{format}  Audio{pcm}*  (Error{message, cause} | Done)
//! ```
//!
//! `Started` is emitted at most once and always before the first `Audio`.
//! Exactly one terminal event ends the sequence. `Started` is missing only
//! when the session fails before the stream format is known.

use crate::error::DecodeError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// PCM layout announced by [`SynthesisEvent::Started`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Sample rate in Hz (e.g., 24000, 44100)
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Bits per PCM sample
    pub bits_per_sample: u16,
}

impl StreamFormat {
    /// Create a new stream format descriptor.
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// 16-bit PCM, the layout produced by decode engines.
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self::new(sample_rate, channels, 16)
    }

    /// Bytes occupied by one sample across all channels.
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize).div_ceil(8)
    }
}

/// A single step of the synthesis output protocol.
#[derive(Debug, Clone)]
pub enum SynthesisEvent {
    /// Stream format is known; the sink should configure its output.
    Started(StreamFormat),

    /// Decoded PCM bytes, in byte-arrival order.
    Audio(Bytes),

    /// Terminal failure.
    Error {
        /// Human readable description.
        message: String,
        /// Underlying error, if any.
        cause: Option<Arc<DecodeError>>,
    },

    /// Terminal success.
    Done,
}

impl SynthesisEvent {
    /// Build an `Error` event from a decode error.
    pub fn from_error(error: DecodeError) -> Self {
        SynthesisEvent::Error {
            message: error.to_string(),
            cause: Some(Arc::new(error)),
        }
    }

    /// Returns `true` for `Error` and `Done`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SynthesisEvent::Error { .. } | SynthesisEvent::Done)
    }

    /// PCM payload of an `Audio` event.
    pub fn pcm(&self) -> Option<&Bytes> {
        match self {
            SynthesisEvent::Audio(pcm) => Some(pcm),
            _ => None,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SynthesisEvent::Started(_) => "started",
            SynthesisEvent::Audio(_) => "audio",
            SynthesisEvent::Error { .. } => "error",
            SynthesisEvent::Done => "done",
        }
    }
}

/// Fully decoded response, produced by buffered decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisResult {
    /// Interleaved PCM bytes
    pub pcm: Bytes,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl SynthesisResult {
    /// Format descriptor of this result.
    pub fn format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.channels, self.bits_per_sample)
    }

    /// Playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        let frame_bytes = self.format().bytes_per_frame();
        if frame_bytes == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (self.pcm.len() / frame_bytes) as f64 / self.sample_rate as f64
    }
}
