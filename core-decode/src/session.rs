//! # Decode Session
//!
//! Per-request state machine for the MPEG path.
//!
//! ```text
//! AwaitingId3 ──tag resolved──▶ AwaitingHeader ──first header──▶ Streaming ──finish──▶ Finished
//!      │                              │                            │
//!      └──────────────────────────────┴────────── failure ─────────┴──▶ Errored
//! ```
//!
//! The session owns the frame backlog and, once the first frame header is
//! known, the decode engine. It produces `Started` and `Audio` events only;
//! terminal events are the sequencer's business.

use crate::adapter::DecoderAdapter;
use crate::config::DecodeConfig;
use crate::engine::EngineFactory;
use crate::error::{DecodeError, Result};
use crate::events::{StreamFormat, SynthesisEvent};
use crate::mpeg::{AssembledFrame, FrameAssembler, Id3Decision, Id3TagSkipper, MpegFrameHeader};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle phase of a [`DecodeSession`].
///
/// Phases only move forward. `Errored` can be entered from any phase
/// except `Finished`, and both `Finished` and `Errored` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Waiting for enough bytes to decide whether an ID3v2 tag leads the stream.
    AwaitingId3,
    /// Scanning for the first frame header.
    AwaitingHeader,
    /// Format announced, frames flowing into the engine.
    Streaming,
    /// End of input reached and the engine fully drained.
    Finished,
    /// A failure ended the session.
    Errored,
}

impl SessionPhase {
    /// Returns `true` for `Finished` and `Errored`.
    pub fn is_final(&self) -> bool {
        matches!(self, SessionPhase::Finished | SessionPhase::Errored)
    }
}

/// Counters describing one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Bytes pushed by the producer
    pub bytes_received: u64,
    /// Bytes dropped without being decoded (ID3 tag, resync garbage)
    pub bytes_skipped: u64,
    /// Complete frames cut out of the stream
    pub frames_assembled: u64,
    /// Frames accepted by the decode engine
    pub frames_decoded: u64,
    /// Offers the engine refused because its queue was full
    pub busy_offers: u64,
    /// PCM bytes emitted as `Audio` events
    pub pcm_bytes: u64,
}

/// Incremental MPEG decode state for one synthesis request.
pub struct DecodeSession {
    phase: SessionPhase,
    assembler: FrameAssembler,
    adapter: Option<DecoderAdapter>,
    factory: Arc<dyn EngineFactory>,
    config: DecodeConfig,
    format: Option<StreamFormat>,
    first_header: Option<MpegFrameHeader>,
    busy_offers: u64,
    frames_decoded: u64,
    pcm_bytes: u64,
}

impl DecodeSession {
    /// Create a session that builds its engine through `factory`.
    pub fn new(factory: Arc<dyn EngineFactory>, config: DecodeConfig) -> Self {
        Self {
            phase: SessionPhase::AwaitingId3,
            assembler: FrameAssembler::new(),
            adapter: None,
            factory,
            config,
            format: None,
            first_header: None,
            busy_offers: 0,
            frames_decoded: 0,
            pcm_bytes: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Stream format fixed by the first frame header, once known.
    pub fn format(&self) -> Option<StreamFormat> {
        self.format
    }

    /// Header of the first frame, once known.
    pub fn first_header(&self) -> Option<&MpegFrameHeader> {
        self.first_header.as_ref()
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        let (busy, fed) = match &self.adapter {
            Some(adapter) => (adapter.busy_offers(), adapter.frames_fed()),
            None => (self.busy_offers, self.frames_decoded),
        };
        SessionStats {
            bytes_received: self.assembler.bytes_received(),
            bytes_skipped: self.assembler.bytes_skipped(),
            frames_assembled: self.assembler.frames_extracted(),
            frames_decoded: fed,
            busy_offers: busy,
            pcm_bytes: self.pcm_bytes,
        }
    }

    /// Feed one chunk of the response body.
    ///
    /// Appends `Started` (once) and any `Audio` produced to `events`. Input
    /// arriving after the session reached a final phase is ignored.
    ///
    /// # Errors
    ///
    /// Any error moves the session to [`SessionPhase::Errored`] and releases
    /// the engine. Events appended before the failure stay in `events`.
    pub fn push(&mut self, chunk: &[u8], events: &mut Vec<SynthesisEvent>) -> Result<()> {
        if self.phase.is_final() {
            debug!(phase = ?self.phase, len = chunk.len(), "Ignoring input after session end");
            return Ok(());
        }

        let result = self.push_inner(chunk, events);
        if result.is_err() {
            self.fail();
        }
        result
    }

    /// Signal end of input and drain the engine.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::SyncNotFound`] if no frame header was ever found
    /// - any engine error raised during the final drain
    pub fn finish(&mut self, events: &mut Vec<SynthesisEvent>) -> Result<()> {
        if self.phase.is_final() {
            return Ok(());
        }

        let result = self.finish_inner(events);
        match &result {
            Ok(()) => {
                self.phase = SessionPhase::Finished;
                self.release();
                let stats = self.stats();
                info!(
                    frames = stats.frames_assembled,
                    skipped = stats.bytes_skipped,
                    pcm_bytes = stats.pcm_bytes,
                    busy_offers = stats.busy_offers,
                    "Decode session finished"
                );
            }
            Err(_) => self.fail(),
        }
        result
    }

    /// Release the decode engine. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            self.busy_offers = adapter.busy_offers();
            self.frames_decoded = adapter.frames_fed();
            adapter.release();
        }
    }

    fn push_inner(&mut self, chunk: &[u8], events: &mut Vec<SynthesisEvent>) -> Result<()> {
        self.assembler.append(chunk);

        if self.phase == SessionPhase::AwaitingId3 {
            match Id3TagSkipper::inspect(self.assembler.pending()) {
                Id3Decision::NeedMoreData => return self.check_backlog(),
                Id3Decision::Skip(0) => {}
                Id3Decision::Skip(len) => {
                    info!(len, "Skipping ID3v2 tag");
                    self.assembler.discard(len);
                }
            }
            self.phase = SessionPhase::AwaitingHeader;
        }

        for frame in self.assembler.extract_frames() {
            self.decode_frame(frame, events)?;
        }

        // The header alone fixes the format; its body may still be in flight
        if self.adapter.is_none() {
            if let Some(header) = self.assembler.pending_header() {
                self.start(&header, events)?;
            }
        }

        self.check_backlog()
    }

    fn finish_inner(&mut self, events: &mut Vec<SynthesisEvent>) -> Result<()> {
        let Some(adapter) = self.adapter.as_mut() else {
            let scanned = self.assembler.bytes_received();
            warn!(scanned, "No MPEG frame found in response");
            return Err(DecodeError::SyncNotFound { scanned });
        };

        let trailing = self.assembler.pending_len();
        if trailing > 0 {
            debug!(trailing, "Discarding incomplete trailing frame");
        }

        let mut pcm = Vec::new();
        adapter.finish(&mut pcm)?;
        self.emit_audio(pcm, events);
        Ok(())
    }

    fn decode_frame(&mut self, frame: AssembledFrame, events: &mut Vec<SynthesisEvent>) -> Result<()> {
        if self.adapter.is_none() {
            self.start(&frame.header, events)?;
        }
        let adapter = self.adapter.as_mut().ok_or(DecodeError::EngineReleased)?;

        let mut pcm = Vec::new();
        let result = adapter.feed_frame(&frame.data, &mut pcm);
        // Output drained before a failure is still delivered
        self.emit_audio(pcm, events);
        result
    }

    fn start(&mut self, header: &MpegFrameHeader, events: &mut Vec<SynthesisEvent>) -> Result<()> {
        let engine = self.factory.create(header, &self.config)?;
        self.adapter = Some(DecoderAdapter::new(engine, &self.config));

        let format = StreamFormat::pcm16(header.sample_rate, header.channels());
        info!(
            version = ?header.version,
            layer = ?header.layer,
            bitrate_kbps = header.bitrate_kbps,
            sample_rate = format.sample_rate,
            channels = format.channels,
            "MPEG stream started"
        );

        self.format = Some(format);
        self.first_header = Some(*header);
        self.phase = SessionPhase::Streaming;
        events.push(SynthesisEvent::Started(format));
        Ok(())
    }

    fn emit_audio(&mut self, pcm: Vec<Bytes>, events: &mut Vec<SynthesisEvent>) {
        for chunk in pcm {
            self.pcm_bytes += chunk.len() as u64;
            events.push(SynthesisEvent::Audio(chunk));
        }
    }

    fn check_backlog(&self) -> Result<()> {
        let pending = self.assembler.pending_len();
        if pending > self.config.max_buffered_bytes {
            return Err(DecodeError::format(format!(
                "{} bytes buffered without a complete frame (limit {})",
                pending, self.config.max_buffered_bytes
            )));
        }
        Ok(())
    }

    fn fail(&mut self) {
        if self.phase != SessionPhase::Finished {
            self.phase = SessionPhase::Errored;
        }
        self.release();
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.release();
    }
}
