//! # Container Detection
//!
//! Identifies the container of a response body from its first bytes and
//! hosts the RIFF/WAVE parser used for fully-buffered responses.

mod wav;

pub use wav::{WavContainerParser, WavFormatDescriptor, WavPayload};

use tracing::debug;

/// Number of leading bytes needed for a confident sniff.
pub const SNIFF_LEN: usize = 12;

/// Container formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// RIFF/WAVE with linear PCM payload
    WavPcm,
    /// MPEG audio elementary stream, optionally prefixed by ID3v2
    MpegAudio,
    /// Nothing recognisable in the leading bytes
    Unknown,
}

impl ContainerFormat {
    /// Detect the container from the first bytes of a body.
    ///
    /// Fewer than [`SNIFF_LEN`] bytes are accepted; detection then relies on
    /// whatever prefix is available.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_decode::ContainerFormat;
    ///
    /// assert_eq!(ContainerFormat::sniff(b"RIFF\x24\x00\x00\x00WAVE"), ContainerFormat::WavPcm);
    /// assert_eq!(ContainerFormat::sniff(b"ID3\x04\x00"), ContainerFormat::MpegAudio);
    /// assert_eq!(ContainerFormat::sniff(&[0xFF, 0xFB, 0x90, 0x00]), ContainerFormat::MpegAudio);
    /// assert_eq!(ContainerFormat::sniff(b"OggS"), ContainerFormat::Unknown);
    /// ```
    pub fn sniff(head: &[u8]) -> Self {
        let format = if Self::is_wav(head) {
            ContainerFormat::WavPcm
        } else if Self::is_mpeg(head) {
            ContainerFormat::MpegAudio
        } else {
            ContainerFormat::Unknown
        };

        debug!(?format, head_len = head.len(), "Sniffed container");
        format
    }

    /// Any RIFF body takes the WAV path; the parser rejects non-WAVE forms.
    fn is_wav(head: &[u8]) -> bool {
        head.len() >= 4 && &head[0..4] == b"RIFF"
    }

    fn is_mpeg(head: &[u8]) -> bool {
        if head.len() >= 3 && &head[0..3] == b"ID3" {
            return true;
        }
        head.len() >= 2 && head[0] == 0xFF && (head[1] & 0xE0) == 0xE0
    }

    /// MIME type commonly served for this container.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContainerFormat::WavPcm => "audio/wav",
            ContainerFormat::MpegAudio => "audio/mpeg",
            ContainerFormat::Unknown => "application/octet-stream",
        }
    }
}
