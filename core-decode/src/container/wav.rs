//! RIFF/WAVE parsing for fully-buffered responses.

use crate::error::{DecodeError, Result};
use crate::events::StreamFormat;
use bytes::Bytes;
use tracing::{debug, instrument, warn};

const PCM_FORMAT_TAG: u16 = 0x0001;
const FMT_BODY_LEN: usize = 16;
const CHUNK_HEADER_LEN: usize = 8;

/// Stream parameters read from the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormatDescriptor {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl WavFormatDescriptor {
    /// Format announced by the `Started` event.
    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.channels, self.bits_per_sample)
    }
}

/// Parsed WAV response: format plus the raw `data` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavPayload {
    /// Stream format from the `fmt ` chunk
    pub format: WavFormatDescriptor,
    /// PCM bytes copied verbatim from the `data` chunk
    pub pcm: Bytes,
}

/// One-shot RIFF/WAVE chunk parser.
///
/// Parsing is all-or-nothing: any structural problem fails the whole buffer.
pub struct WavContainerParser;

impl WavContainerParser {
    /// Parse a complete RIFF/WAVE buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Format`] if:
    /// - `"RIFF"` is not at offset 0 or `"WAVE"` is not at offset 8
    /// - the `fmt ` chunk is not linear PCM or is shorter than 16 bytes
    /// - a chunk declares more bytes than the buffer holds
    /// - no `fmt ` or no `data` chunk is present
    #[instrument(skip(buffer), fields(len = buffer.len()))]
    pub fn parse(buffer: &[u8]) -> Result<WavPayload> {
        if buffer.len() < 12 {
            return Err(DecodeError::format(format!(
                "buffer too short for RIFF header ({} bytes)",
                buffer.len()
            )));
        }
        if &buffer[0..4] != b"RIFF" {
            return Err(DecodeError::format(format!(
                "not a RIFF file: {:?}",
                String::from_utf8_lossy(&buffer[0..4])
            )));
        }
        if &buffer[8..12] != b"WAVE" {
            return Err(DecodeError::format(format!(
                "not a WAVE file: {:?}",
                String::from_utf8_lossy(&buffer[8..12])
            )));
        }

        let mut format = None;
        let mut pcm = None;
        let mut pos = 12;

        while buffer.len() - pos >= CHUNK_HEADER_LEN {
            let id = &buffer[pos..pos + 4];
            let size = read_u32(buffer, pos + 4) as usize;
            let body_start = pos + CHUNK_HEADER_LEN;
            let remaining = buffer.len() - body_start;

            if size > remaining {
                return Err(DecodeError::format(format!(
                    "chunk {:?} declares {} bytes but only {} remain",
                    String::from_utf8_lossy(id),
                    size,
                    remaining
                )));
            }
            let body = &buffer[body_start..body_start + size];

            match id {
                b"fmt " => format = Some(Self::parse_fmt(body)?),
                b"data" => {
                    if pcm.is_some() {
                        warn!("Multiple data chunks, keeping the last one");
                    }
                    pcm = Some(Bytes::copy_from_slice(body));
                }
                _ => debug!(
                    chunk = %String::from_utf8_lossy(id),
                    size,
                    "Skipping unknown chunk"
                ),
            }

            pos = body_start + size;
        }

        if pos < buffer.len() {
            debug!(trailing = buffer.len() - pos, "Ignoring trailing bytes");
        }

        let format = format.ok_or_else(|| DecodeError::format("no fmt chunk found"))?;
        let pcm = pcm.ok_or_else(|| DecodeError::format("no data chunk found"))?;

        debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            bits = format.bits_per_sample,
            pcm_bytes = pcm.len(),
            "Parsed WAV container"
        );

        Ok(WavPayload { format, pcm })
    }

    fn parse_fmt(body: &[u8]) -> Result<WavFormatDescriptor> {
        if body.len() < FMT_BODY_LEN {
            return Err(DecodeError::format(format!(
                "fmt chunk too small: {} bytes",
                body.len()
            )));
        }

        let audio_format = read_u16(body, 0);
        if audio_format != PCM_FORMAT_TAG {
            return Err(DecodeError::format(format!(
                "unsupported audio format {} (expected PCM)",
                audio_format
            )));
        }

        // byte rate (8..12) and block align (12..14) are not needed
        Ok(WavFormatDescriptor {
            channels: read_u16(body, 2),
            sample_rate: read_u32(body, 4),
            bits_per_sample: read_u16(body, 14),
        })
    }
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
