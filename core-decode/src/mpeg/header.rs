//! # MPEG Audio Frame Headers
//!
//! Decodes the 4-byte MPEG audio frame header and locates frame sync words
//! inside a byte buffer.
//!
//! ```text
//!  byte 0   byte 1            byte 2               byte 3
//! 11111111 111VVLLP          BBBBSSPx             CCxxxxxx
//!          │  │ │            │   │ └ padding      └ channel mode
//!          │  │ └ layer      │   └ sample-rate index
//!          │  └ version      └ bitrate index
//!          └ sync
//! ```
//!
//! Any candidate whose version, layer, bitrate or sample-rate field holds a
//! reserved/free value is rejected, and scanning resumes one byte later.

use tracing::trace;

/// Smallest frame length accepted as real.
const MIN_FRAME_LEN: u32 = 4;

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpegVersion {
    /// MPEG-1
    Mpeg1,
    /// MPEG-2 (low sampling frequencies)
    Mpeg2,
    /// MPEG-2.5 (unofficial extension)
    Mpeg25,
}

/// MPEG audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpegLayer {
    /// Layer I
    I,
    /// Layer II
    II,
    /// Layer III
    III,
}

/// Channel mode field of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    /// Plain stereo
    Stereo,
    /// Joint stereo
    JointStereo,
    /// Two independent mono channels
    DualChannel,
    /// Single channel
    Mono,
}

impl ChannelMode {
    /// Number of output channels for this mode.
    pub fn channel_count(&self) -> u16 {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}

/// Why a candidate header was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRejection {
    /// First 11 bits are not all set.
    NoSync,
    /// Version bits `01`.
    ReservedVersion,
    /// Layer bits `00`.
    ReservedLayer,
    /// Bitrate index 0 (free format).
    FreeBitrate,
    /// Bitrate index 15.
    BadBitrate,
    /// Sample-rate index 3.
    ReservedSampleRate,
    /// Computed frame length below the minimum.
    SpuriousLength(u32),
}

/// Decoded MPEG audio frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MpegFrameHeader {
    /// Audio version
    pub version: MpegVersion,
    /// Audio layer
    pub layer: MpegLayer,
    /// Bitrate in kbps
    pub bitrate_kbps: u32,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel mode
    pub channel_mode: ChannelMode,
    /// Padding slot present
    pub padding: bool,
    /// Total frame length in bytes, header included
    pub frame_len: u32,
}

// Bitrates in kbps, indexed by the 4-bit bitrate index. Index 0 (free) and
// 15 (bad) are rejected before lookup.
const BITRATES_V1_L1: [u32; 16] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0,
];
const BITRATES_V1_L2: [u32; 16] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0,
];
const BITRATES_V1_L3: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const BITRATES_V2_L1: [u32; 16] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0,
];
const BITRATES_V2_L23: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

const SAMPLE_RATES_V1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATES_V2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATES_V25: [u32; 3] = [11025, 12000, 8000];

impl MpegFrameHeader {
    /// Decode a 4-byte header.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_decode::mpeg::{MpegFrameHeader, MpegLayer, MpegVersion};
    ///
    /// let header = MpegFrameHeader::parse([0xFF, 0xFB, 0x90, 0x00]).unwrap();
    /// assert_eq!(header.version, MpegVersion::Mpeg1);
    /// assert_eq!(header.layer, MpegLayer::III);
    /// assert_eq!(header.bitrate_kbps, 128);
    /// assert_eq!(header.sample_rate, 44100);
    /// assert_eq!(header.frame_len, 417);
    /// ```
    pub fn parse(bytes: [u8; 4]) -> Result<Self, HeaderRejection> {
        let [b0, b1, b2, b3] = bytes;

        if b0 != 0xFF || (b1 & 0xE0) != 0xE0 {
            return Err(HeaderRejection::NoSync);
        }

        let version = match (b1 >> 3) & 0x03 {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return Err(HeaderRejection::ReservedVersion),
        };

        let layer = match (b1 >> 1) & 0x03 {
            1 => MpegLayer::III,
            2 => MpegLayer::II,
            3 => MpegLayer::I,
            _ => return Err(HeaderRejection::ReservedLayer),
        };

        let bitrate_index = ((b2 >> 4) & 0x0F) as usize;
        match bitrate_index {
            0 => return Err(HeaderRejection::FreeBitrate),
            15 => return Err(HeaderRejection::BadBitrate),
            _ => {}
        }

        let sample_rate_index = ((b2 >> 2) & 0x03) as usize;
        if sample_rate_index == 3 {
            return Err(HeaderRejection::ReservedSampleRate);
        }

        let padding = (b2 >> 1) & 0x01 == 1;

        let channel_mode = match (b3 >> 6) & 0x03 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        let bitrate_kbps = bitrate_table(version, layer)[bitrate_index];
        let sample_rate = sample_rate_table(version)[sample_rate_index];
        let frame_len = frame_length(version, layer, bitrate_kbps, sample_rate, padding);

        if frame_len < MIN_FRAME_LEN {
            return Err(HeaderRejection::SpuriousLength(frame_len));
        }

        Ok(Self {
            version,
            layer,
            bitrate_kbps,
            sample_rate,
            channel_mode,
            padding,
            frame_len,
        })
    }

    /// Number of output channels.
    pub fn channels(&self) -> u16 {
        self.channel_mode.channel_count()
    }

    /// PCM samples per channel carried by one frame.
    pub fn samples_per_frame(&self) -> u32 {
        match (self.layer, self.version) {
            (MpegLayer::I, _) => 384,
            (MpegLayer::II, _) => 1152,
            (MpegLayer::III, MpegVersion::Mpeg1) => 1152,
            (MpegLayer::III, _) => 576,
        }
    }
}

fn bitrate_table(version: MpegVersion, layer: MpegLayer) -> &'static [u32; 16] {
    match (version, layer) {
        (MpegVersion::Mpeg1, MpegLayer::I) => &BITRATES_V1_L1,
        (MpegVersion::Mpeg1, MpegLayer::II) => &BITRATES_V1_L2,
        (MpegVersion::Mpeg1, MpegLayer::III) => &BITRATES_V1_L3,
        (_, MpegLayer::I) => &BITRATES_V2_L1,
        (_, _) => &BITRATES_V2_L23,
    }
}

fn sample_rate_table(version: MpegVersion) -> &'static [u32; 3] {
    match version {
        MpegVersion::Mpeg1 => &SAMPLE_RATES_V1,
        MpegVersion::Mpeg2 => &SAMPLE_RATES_V2,
        MpegVersion::Mpeg25 => &SAMPLE_RATES_V25,
    }
}

fn frame_length(
    version: MpegVersion,
    layer: MpegLayer,
    bitrate_kbps: u32,
    sample_rate: u32,
    padding: bool,
) -> u32 {
    let padding = u32::from(padding);
    let bits_per_sec = bitrate_kbps * 1000;

    match layer {
        MpegLayer::I => (12 * bits_per_sec / sample_rate + padding) * 4,
        MpegLayer::II | MpegLayer::III => {
            let coefficient = match version {
                MpegVersion::Mpeg1 => 144,
                MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 72,
            };
            coefficient * bits_per_sec / sample_rate + padding
        }
    }
}

/// A frame located inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Offset of the sync word within the scanned buffer
    pub offset: usize,
    /// Decoded header
    pub header: MpegFrameHeader,
}

impl FrameInfo {
    /// Frame length in bytes.
    pub fn size(&self) -> usize {
        self.header.frame_len as usize
    }

    /// Offset one past the last byte of the frame.
    pub fn end(&self) -> usize {
        self.offset + self.size()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.header.sample_rate
    }

    /// Number of output channels.
    pub fn channels(&self) -> u16 {
        self.header.channels()
    }
}

/// Locates valid MPEG frame headers.
pub struct MpegFrameScanner;

impl MpegFrameScanner {
    /// Find the first valid header at or after `from`.
    ///
    /// Positions are examined while at least four bytes remain. A rejected
    /// candidate resumes the search at the next byte. The returned frame may
    /// extend past the end of `buffer`.
    pub fn scan(buffer: &[u8], from: usize) -> Option<FrameInfo> {
        let last = buffer.len().checked_sub(4)?;
        let mut i = from;

        while i <= last {
            if buffer[i] != 0xFF || (buffer[i + 1] & 0xE0) != 0xE0 {
                i += 1;
                continue;
            }

            let candidate = [buffer[i], buffer[i + 1], buffer[i + 2], buffer[i + 3]];
            match MpegFrameHeader::parse(candidate) {
                Ok(header) => return Some(FrameInfo { offset: i, header }),
                Err(reason) => {
                    trace!(offset = i, ?reason, "Rejected frame candidate");
                    i += 1;
                }
            }
        }

        None
    }

    /// First offset a later scan must revisit after `scan(buffer, from)`
    /// returned `None`.
    ///
    /// Every position before it has already been rejected on bytes that are
    /// all present, so no future data can turn it into a frame start.
    pub fn resume_offset(buffer: &[u8], from: usize) -> usize {
        from.max(buffer.len().saturating_sub(3))
    }
}
