//! # Streaming Synthesis Decode
//!
//! Turns a network-delivered TTS response body into an ordered sequence of
//! PCM events.
//!
//! ## Overview
//!
//! This module handles:
//! - Container sniffing (RIFF/WAVE vs. MPEG audio)
//! - One-shot RIFF/WAVE parsing for fully buffered responses
//! - ID3v2 skipping, MPEG frame synchronisation and incremental frame assembly
//!   across arbitrary chunk boundaries
//! - Feed/drain interleave against a bounded decode engine
//! - The `Started → Audio* → (Error | Done)` event protocol with explicit,
//!   exactly-once engine release
//! - An async driver with cooperative cancellation
//!
//! ## Pipeline
//!
//! ```text
//! bytes ─▶ Id3TagSkipper ─▶ FrameAssembler ─▶ DecoderAdapter ─▶ EventSequencer ─▶ sink
//!              (MpegFrameScanner)               (DecodeEngine)
//! ```
//!
//! ## Feature Flags
//!
//! - `symphonia-engine` (default): in-process MPEG decode engine

pub mod adapter;
pub mod config;
pub mod container;
pub mod driver;
pub mod engine;
pub mod error;
pub mod events;
pub mod mpeg;
pub mod sequencer;
pub mod session;

pub use adapter::DecoderAdapter;
pub use config::DecodeConfig;
pub use container::{ContainerFormat, WavContainerParser, WavFormatDescriptor, WavPayload};
pub use driver::{decode_buffered, DriverOutcome, SynthesisDriver, SynthesisSink};
pub use engine::{DecodeEngine, EngineFactory, EnginePoll, OfferStatus};
pub use error::{DecodeError, Result};
pub use events::{StreamFormat, SynthesisEvent, SynthesisResult};
pub use mpeg::{FrameAssembler, Id3TagSkipper, MpegFrameHeader, MpegFrameScanner};
pub use sequencer::{collect_pcm, wav_events, EventSequencer};
pub use session::{DecodeSession, SessionPhase, SessionStats};

#[cfg(feature = "symphonia-engine")]
pub use engine::{SymphoniaEngine, SymphoniaEngineFactory};
