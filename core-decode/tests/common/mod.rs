//! Fixtures and a scriptable fake decode engine shared by integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use core_decode::{
    DecodeConfig, DecodeEngine, DecodeError, EngineFactory, EnginePoll, MpegFrameHeader,
    OfferStatus, Result, SynthesisEvent,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// PCM bytes the fake engine emits per frame (1152 stereo 16-bit samples).
pub const PCM_PER_FRAME: usize = 1152 * 2 * 2;

/// MPEG1 Layer III, 128 kbps, 44.1 kHz, stereo: 417 bytes.
pub fn frame() -> Vec<u8> {
    frame_with_header([0xFF, 0xFB, 0x90, 0x00], 417)
}

/// Same stream with the padding bit set: 418 bytes.
pub fn padded_frame() -> Vec<u8> {
    frame_with_header([0xFF, 0xFB, 0x92, 0x00], 418)
}

fn frame_with_header(header: [u8; 4], len: usize) -> Vec<u8> {
    let mut f = vec![0u8; len];
    f[..4].copy_from_slice(&header);
    f
}

/// ID3v2.4 tag whose synchsafe size is 257 (267 bytes in total).
pub fn id3_tag() -> Vec<u8> {
    let mut tag = b"ID3\x04\x00\x00".to_vec();
    tag.extend_from_slice(&[0x00, 0x00, 0x02, 0x01]);
    tag.extend(std::iter::repeat(0xAB).take(257));
    tag
}

/// ID3 tag followed by `frames` frames alternating between 417 and 418 bytes.
pub fn mpeg_fixture(frames: usize) -> Vec<u8> {
    let mut data = id3_tag();
    for i in 0..frames {
        if i % 2 == 0 {
            data.extend(frame());
        } else {
            data.extend(padded_frame());
        }
    }
    data
}

/// Minimal RIFF/WAVE file around `pcm`.
pub fn wav_fixture(sample_rate: u32, channels: u16, pcm: &[u8]) -> Vec<u8> {
    let bits = 16u16;
    let block_align = channels * bits / 8;

    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&channels.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.to_le_bytes());
    fmt.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&bits.to_le_bytes());

    let mut body = b"WAVE".to_vec();
    body.extend_from_slice(b"fmt ");
    body.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
    body.extend_from_slice(&fmt);
    body.extend_from_slice(b"data");
    body.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
    body.extend_from_slice(pcm);

    let mut wav = b"RIFF".to_vec();
    wav.extend_from_slice(&(body.len() as u32).to_le_bytes());
    wav.extend_from_slice(&body);
    wav
}

/// WAV whose PCM payload is two MPEG frames, with the form type replaced by
/// `WAVX`. Routing it anywhere but the WAV parser would decode the frames.
pub fn riff_with_bad_form_type() -> Vec<u8> {
    let mut pcm = frame();
    pcm.extend(frame());
    let mut wav = wav_fixture(44100, 2, &pcm);
    wav[8..12].copy_from_slice(b"WAVX");
    wav
}

/// Split `data` at `offsets` (ascending) into owned chunks.
pub fn split_at(data: &[u8], offsets: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &offset in offsets.iter().chain(std::iter::once(&data.len())) {
        chunks.push(data[start..offset].to_vec());
        start = offset;
    }
    chunks
}

/// Deterministic pseudo-random split offsets.
pub fn pseudo_random_splits(len: usize, seed: u64, count: usize) -> Vec<usize> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut offsets: Vec<usize> = (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as usize) % len.max(1)
        })
        .collect();
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

pub fn kinds(events: &[SynthesisEvent]) -> Vec<&'static str> {
    events.iter().map(SynthesisEvent::kind).collect()
}

/// Asserts `Started? Audio* (Error | Done)` with `Started` required before
/// any `Audio`.
pub fn assert_well_formed(events: &[SynthesisEvent]) {
    let (last, body) = events.split_last().expect("empty event list");
    assert!(last.is_terminal(), "missing terminal event: {:?}", kinds(events));

    let mut started = false;
    for (i, event) in body.iter().enumerate() {
        match event {
            SynthesisEvent::Started(_) => {
                assert!(!started && i == 0, "misplaced Started: {:?}", kinds(events));
                started = true;
            }
            SynthesisEvent::Audio(_) => assert!(started, "Audio before Started"),
            other => panic!("terminal event {:?} before the end", other.kind()),
        }
    }
}

// ============================================================================
// Fake Engine
// ============================================================================

/// Observations shared between a [`FakeFactory`] and its engines.
#[derive(Default)]
pub struct EngineProbe {
    pub created: AtomicUsize,
    pub releases: AtomicUsize,
    pub offers: AtomicUsize,
    pub frame_lengths: parking_lot::Mutex<Vec<usize>>,
}

impl EngineProbe {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Factory for [`FakeEngine`]s.
#[derive(Clone, Default)]
pub struct FakeFactory {
    pub probe: Arc<EngineProbe>,
    /// Refuse every n-th offer once with `Busy`.
    pub busy_every: Option<usize>,
    /// Fail the offer of this (zero-based) frame.
    pub fail_at: Option<usize>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn busy_every(mut self, n: usize) -> Self {
        self.busy_every = Some(n);
        self
    }

    pub fn fail_at(mut self, frame: usize) -> Self {
        self.fail_at = Some(frame);
        self
    }

    pub fn shared(&self) -> Arc<dyn EngineFactory> {
        Arc::new(self.clone())
    }
}

impl EngineFactory for FakeFactory {
    fn create(
        &self,
        header: &MpegFrameHeader,
        _config: &DecodeConfig,
    ) -> Result<Box<dyn DecodeEngine>> {
        assert_eq!(header.sample_rate, 44100);
        self.probe.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            probe: self.probe.clone(),
            busy_every: self.busy_every,
            fail_at: self.fail_at,
            accepted: 0,
            refused_last: false,
            output: VecDeque::new(),
            eos: false,
        }))
    }
}

/// Emits `PCM_PER_FRAME` bytes per frame, filled with the frame's index.
///
/// Output lags input by one frame until end of stream, like a codec with
/// look-ahead.
pub struct FakeEngine {
    probe: Arc<EngineProbe>,
    busy_every: Option<usize>,
    fail_at: Option<usize>,
    accepted: usize,
    refused_last: bool,
    output: VecDeque<Bytes>,
    eos: bool,
}

impl DecodeEngine for FakeEngine {
    fn offer(&mut self, frame: &[u8], _timeout: Duration) -> Result<OfferStatus> {
        let call = self.probe.offers.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_at == Some(self.accepted) {
            return Err(DecodeError::Engine("corrupt frame".to_string()));
        }
        if let Some(n) = self.busy_every {
            if call % n == 0 && !self.refused_last {
                self.refused_last = true;
                return Ok(OfferStatus::Busy);
            }
        }
        self.refused_last = false;

        self.probe.frame_lengths.lock().push(frame.len());
        self.output
            .push_back(Bytes::from(vec![self.accepted as u8; PCM_PER_FRAME]));
        self.accepted += 1;
        Ok(OfferStatus::Accepted)
    }

    fn poll(&mut self, _timeout: Duration) -> Result<EnginePoll> {
        if self.output.len() > 1 || (self.eos && !self.output.is_empty()) {
            return Ok(self
                .output
                .pop_front()
                .map(EnginePoll::Chunk)
                .unwrap_or(EnginePoll::Empty));
        }
        Ok(if self.eos {
            EnginePoll::EndOfStream
        } else {
            EnginePoll::Empty
        })
    }

    fn signal_end_of_stream(&mut self) -> Result<()> {
        self.eos = true;
        Ok(())
    }

    fn release(&mut self) {
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
    }
}
