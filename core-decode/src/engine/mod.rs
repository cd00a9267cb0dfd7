//! # Decode Engine Capability
//!
//! The narrow interface through which compressed frames become PCM.
//!
//! An engine has bounded input and output queues and is driven by polling:
//!
//! - [`DecodeEngine::offer`] hands over one complete frame or reports that the
//!   input side is full
//! - [`DecodeEngine::poll`] returns one decoded chunk, nothing yet, or the end
//!   of the output stream once end of input was signalled and everything was
//!   drained
//! - [`DecodeEngine::release`] frees the engine; it is invoked exactly once by
//!   the owning session
//!
//! Both `offer` and `poll` take an upper bound on how long they may block.
//! Engines backed by platform codecs honour it; in-process engines return
//! immediately.

#[cfg(feature = "symphonia-engine")]
mod symphonia;

#[cfg(feature = "symphonia-engine")]
pub use self::symphonia::{SymphoniaEngine, SymphoniaEngineFactory};

use crate::config::DecodeConfig;
use crate::error::Result;
use crate::mpeg::MpegFrameHeader;
use bytes::Bytes;
use std::time::Duration;

/// Result of offering a frame to an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferStatus {
    /// The frame was queued for decoding.
    Accepted,
    /// The input queue is full; drain output and offer the same frame again.
    Busy,
}

/// Result of polling an engine for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePoll {
    /// Decoded 16-bit little-endian interleaved PCM.
    Chunk(Bytes),
    /// No output available within the timeout.
    Empty,
    /// End of input was signalled and all output has been returned.
    EndOfStream,
}

/// A streaming decode engine exclusively owned by one session.
pub trait DecodeEngine: Send {
    /// Offer one complete compressed frame.
    fn offer(&mut self, frame: &[u8], timeout: Duration) -> Result<OfferStatus>;

    /// Poll for decoded output.
    fn poll(&mut self, timeout: Duration) -> Result<EnginePoll>;

    /// Mark the end of input. Output already queued is still returned by
    /// [`poll`](Self::poll) before [`EnginePoll::EndOfStream`].
    fn signal_end_of_stream(&mut self) -> Result<()>;

    /// Free every resource held by the engine.
    fn release(&mut self);
}

/// Creates an engine for a session once its first frame header is known.
pub trait EngineFactory: Send + Sync {
    /// Build an engine configured for the stream described by `header`.
    fn create(&self, header: &MpegFrameHeader, config: &DecodeConfig)
        -> Result<Box<dyn DecodeEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&MpegFrameHeader, &DecodeConfig) -> Result<Box<dyn DecodeEngine>> + Send + Sync,
{
    fn create(
        &self,
        header: &MpegFrameHeader,
        config: &DecodeConfig,
    ) -> Result<Box<dyn DecodeEngine>> {
        self(header, config)
    }
}
