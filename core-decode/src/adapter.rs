//! # Decoder Adapter
//!
//! Feed/drain interleave between assembled frames and a bounded decode
//! engine.
//!
//! Every accepted frame is followed by a non-blocking drain so the engine's
//! output queue never fills up while input is still being pushed. A busy
//! engine is drained and offered the same frame again; frames are never
//! dropped.

use crate::config::DecodeConfig;
use crate::engine::{DecodeEngine, EnginePoll, OfferStatus};
use crate::error::{DecodeError, Result};
use bytes::Bytes;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Owns a decode engine for one session and moves frames through it.
pub struct DecoderAdapter {
    engine: Option<Box<dyn DecodeEngine>>,
    offer_timeout: Duration,
    drain_timeout: Duration,
    final_drain_budget: Duration,
    max_stalled_offers: u32,
    busy_offers: u64,
    frames_fed: u64,
}

impl DecoderAdapter {
    /// Wrap an engine using the timeouts from `config`.
    pub fn new(engine: Box<dyn DecodeEngine>, config: &DecodeConfig) -> Self {
        Self {
            engine: Some(engine),
            offer_timeout: config.offer_timeout,
            drain_timeout: config.drain_timeout,
            final_drain_budget: config.final_drain_budget,
            max_stalled_offers: config.max_stalled_offers,
            busy_offers: 0,
            frames_fed: 0,
        }
    }

    /// Offer one frame, pushing all PCM that becomes available into `out`.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::EngineStalled`] if the engine stays busy with nothing
    ///   to drain for `max_stalled_offers` consecutive attempts
    /// - [`DecodeError::EngineReleased`] after [`release`](Self::release)
    /// - any error reported by the engine
    pub fn feed_frame(&mut self, frame: &[u8], out: &mut Vec<Bytes>) -> Result<()> {
        let mut stalled = 0u32;

        loop {
            let engine = self.engine.as_mut().ok_or(DecodeError::EngineReleased)?;
            match engine.offer(frame, self.offer_timeout)? {
                OfferStatus::Accepted => break,
                OfferStatus::Busy => {
                    self.busy_offers += 1;
                    let drained = self.drain_available(out)?;
                    if drained > 0 {
                        stalled = 0;
                    } else {
                        stalled += 1;
                        if stalled >= self.max_stalled_offers {
                            warn!(attempts = stalled, "Decode engine stalled");
                            return Err(DecodeError::EngineStalled { attempts: stalled });
                        }
                    }
                    trace!(stalled, drained, "Engine busy, retrying frame");
                }
            }
        }

        self.frames_fed += 1;
        self.drain_available(out)?;
        Ok(())
    }

    /// Signal end of input and drain everything the engine still holds.
    ///
    /// Each poll waits at most `drain_timeout`; the whole drain stops after
    /// `final_drain_budget` even if the engine never reports end of stream.
    pub fn finish(&mut self, out: &mut Vec<Bytes>) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(DecodeError::EngineReleased)?;
        engine.signal_end_of_stream()?;

        let started = Instant::now();
        let mut chunks = 0usize;
        loop {
            match engine.poll(self.drain_timeout)? {
                EnginePoll::Chunk(pcm) => {
                    chunks += 1;
                    if !pcm.is_empty() {
                        out.push(pcm);
                    }
                }
                EnginePoll::EndOfStream => break,
                EnginePoll::Empty => {
                    if started.elapsed() >= self.final_drain_budget {
                        warn!(
                            budget_ms = self.final_drain_budget.as_millis() as u64,
                            "Final drain timed out before end of stream"
                        );
                        break;
                    }
                }
            }
        }

        debug!(chunks, elapsed_ms = started.elapsed().as_millis() as u64, "Final drain complete");
        Ok(())
    }

    /// Release the engine. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.release();
            debug!(
                frames_fed = self.frames_fed,
                busy_offers = self.busy_offers,
                "Released decode engine"
            );
        }
    }

    /// Returns `true` once the engine was released.
    pub fn is_released(&self) -> bool {
        self.engine.is_none()
    }

    /// Number of busy offers observed so far.
    pub fn busy_offers(&self) -> u64 {
        self.busy_offers
    }

    /// Number of frames accepted by the engine.
    pub fn frames_fed(&self) -> u64 {
        self.frames_fed
    }

    /// Drain without waiting until the engine has nothing more to give.
    fn drain_available(&mut self, out: &mut Vec<Bytes>) -> Result<usize> {
        let engine = self.engine.as_mut().ok_or(DecodeError::EngineReleased)?;
        let mut drained = 0;
        loop {
            match engine.poll(Duration::ZERO)? {
                EnginePoll::Chunk(pcm) => {
                    drained += 1;
                    if !pcm.is_empty() {
                        out.push(pcm);
                    }
                }
                EnginePoll::Empty | EnginePoll::EndOfStream => return Ok(drained),
            }
        }
    }
}

impl Drop for DecoderAdapter {
    fn drop(&mut self) {
        self.release();
    }
}
