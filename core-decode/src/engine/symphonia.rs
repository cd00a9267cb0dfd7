//! # Symphonia Decode Engine
//!
//! In-process MPEG audio engine built on Symphonia's Layer I/II/III decoder.
//!
//! Frames are decoded synchronously inside [`offer`](DecodeEngine::offer) and
//! parked in a bounded output queue until polled, which gives callers the
//! same busy/drain behaviour as an asynchronous platform codec.

use super::{DecodeEngine, EngineFactory, EnginePoll, OfferStatus};
use crate::config::DecodeConfig;
use crate::error::{DecodeError, Result};
use crate::mpeg::{MpegFrameHeader, MpegLayer};
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CodecParameters, CodecType, Decoder, DecoderOptions, CODEC_TYPE_MP1, CODEC_TYPE_MP2,
    CODEC_TYPE_MP3,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::{debug, error, warn};

/// Consecutive undecodable frames tolerated before the engine gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Decode engine backed by a Symphonia codec.
pub struct SymphoniaEngine {
    decoder: Option<Box<dyn Decoder>>,
    output: VecDeque<Bytes>,
    queue_depth: usize,
    sample_buf: Option<SampleBuffer<i16>>,
    /// Timestamp of the next packet, in samples per channel.
    next_ts: u64,
    consecutive_errors: u32,
    end_of_stream: bool,
}

impl SymphoniaEngine {
    /// Create an engine for the stream described by `header`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Engine`] if no Symphonia codec is registered for
    /// the header's layer.
    pub fn new(header: &MpegFrameHeader, queue_depth: usize) -> Result<Self> {
        let mut params = CodecParameters::new();
        params
            .for_codec(codec_for_layer(header.layer))
            .with_sample_rate(header.sample_rate);

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| DecodeError::engine(format!("Failed to create decoder: {}", e)))?;

        debug!(
            layer = ?header.layer,
            sample_rate = header.sample_rate,
            channels = header.channels(),
            queue_depth,
            "Created Symphonia decode engine"
        );

        Ok(Self {
            decoder: Some(decoder),
            output: VecDeque::with_capacity(queue_depth),
            queue_depth: queue_depth.max(1),
            sample_buf: None,
            next_ts: 0,
            consecutive_errors: 0,
            end_of_stream: false,
        })
    }

    fn decode_frame(&mut self, frame: &[u8]) -> Result<()> {
        let decoder = self.decoder.as_mut().ok_or(DecodeError::EngineReleased)?;
        let packet = Packet::new_from_slice(0, self.next_ts, 0, frame);

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(err @ (SymphoniaError::DecodeError(_) | SymphoniaError::IoError(_)))
                if self.consecutive_errors + 1 < MAX_CONSECUTIVE_ERRORS =>
            {
                self.consecutive_errors += 1;
                warn!(
                    attempt = self.consecutive_errors,
                    ts = packet.ts(),
                    "Skipping undecodable frame: {}",
                    err
                );
                return Ok(());
            }
            Err(e) => {
                error!("Fatal decode error: {}", e);
                return Err(DecodeError::engine(format!("Failed to decode frame: {}", e)));
            }
        };
        self.consecutive_errors = 0;

        let frames = decoded.frames();
        self.next_ts += frames as u64;
        if frames == 0 {
            return Ok(());
        }

        let spec = *decoded.spec();
        let needed = decoded.capacity() * spec.channels.count();
        if self.sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
            self.sample_buf = Some(SampleBuffer::<i16>::new(decoded.capacity() as u64, spec));
        }
        let Some(sample_buf) = self.sample_buf.as_mut() else {
            return Ok(());
        };
        sample_buf.copy_interleaved_ref(decoded);

        let pcm: Vec<u8> = sample_buf
            .samples()
            .iter()
            .flat_map(|sample| sample.to_le_bytes())
            .collect();
        self.output.push_back(Bytes::from(pcm));

        Ok(())
    }
}

fn codec_for_layer(layer: MpegLayer) -> CodecType {
    match layer {
        MpegLayer::I => CODEC_TYPE_MP1,
        MpegLayer::II => CODEC_TYPE_MP2,
        MpegLayer::III => CODEC_TYPE_MP3,
    }
}

impl DecodeEngine for SymphoniaEngine {
    fn offer(&mut self, frame: &[u8], _timeout: Duration) -> Result<OfferStatus> {
        if self.decoder.is_none() {
            return Err(DecodeError::EngineReleased);
        }
        if self.end_of_stream {
            return Err(DecodeError::engine("frame offered after end of stream"));
        }
        if self.output.len() >= self.queue_depth {
            return Ok(OfferStatus::Busy);
        }

        self.decode_frame(frame)?;
        Ok(OfferStatus::Accepted)
    }

    fn poll(&mut self, _timeout: Duration) -> Result<EnginePoll> {
        if self.decoder.is_none() {
            return Err(DecodeError::EngineReleased);
        }

        Ok(match self.output.pop_front() {
            Some(chunk) => EnginePoll::Chunk(chunk),
            None if self.end_of_stream => EnginePoll::EndOfStream,
            None => EnginePoll::Empty,
        })
    }

    fn signal_end_of_stream(&mut self) -> Result<()> {
        if self.decoder.is_none() {
            return Err(DecodeError::EngineReleased);
        }
        self.end_of_stream = true;
        Ok(())
    }

    fn release(&mut self) {
        if self.decoder.take().is_some() {
            debug!(
                discarded_chunks = self.output.len(),
                "Released Symphonia decode engine"
            );
        }
        self.output.clear();
        self.sample_buf = None;
    }
}

/// Builds a [`SymphoniaEngine`] per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaEngineFactory;

impl EngineFactory for SymphoniaEngineFactory {
    fn create(
        &self,
        header: &MpegFrameHeader,
        config: &DecodeConfig,
    ) -> Result<Box<dyn DecodeEngine>> {
        Ok(Box::new(SymphoniaEngine::new(header, config.engine_queue_depth)?))
    }
}
