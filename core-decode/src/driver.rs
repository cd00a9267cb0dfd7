//! # Synthesis Driver
//!
//! Async entry point that reads a response body, picks the decode path from
//! the leading bytes, and forwards the resulting events to a sink.
//!
//! ## Cancellation
//!
//! The driver observes a [`CancellationToken`] while waiting for body reads
//! and before every event it delivers. Once cancelled it stops reading and
//! delivering, releases the session's engine and reports
//! [`DriverOutcome::Cancelled`]. No terminal event is sent in that case.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core_decode::{DecodeConfig, SynthesisDriver, SynthesisEvent};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(body: tokio::fs::File) -> core_decode::Result<()> {
//! let driver = SynthesisDriver::with_symphonia(DecodeConfig::default())?;
//! let mut events: Vec<SynthesisEvent> = Vec::new();
//! let outcome = driver.run(body, &mut events, &CancellationToken::new()).await?;
//! println!("{:?}: {} events", outcome, events.len());
//! # Ok(())
//! # }
//! ```

use crate::config::DecodeConfig;
use crate::container::{ContainerFormat, WavContainerParser, SNIFF_LEN};
use crate::engine::EngineFactory;
use crate::error::{DecodeError, Result};
use crate::events::{SynthesisEvent, SynthesisResult};
use crate::sequencer::{collect_pcm, wav_events, EventSequencer};
use crate::session::DecodeSession;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Sinks
// ============================================================================

/// Consumer of synthesis events (audio output, platform TTS callback).
pub trait SynthesisSink: Send {
    /// Deliver one event.
    ///
    /// Returning an error stops the driver; the session is released.
    fn deliver(&mut self, event: SynthesisEvent) -> Result<()>;
}

impl SynthesisSink for Vec<SynthesisEvent> {
    fn deliver(&mut self, event: SynthesisEvent) -> Result<()> {
        self.push(event);
        Ok(())
    }
}

impl SynthesisSink for UnboundedSender<SynthesisEvent> {
    fn deliver(&mut self, event: SynthesisEvent) -> Result<()> {
        self.send(event).map_err(|_| DecodeError::SinkClosed)
    }
}

// ============================================================================
// Driver
// ============================================================================

/// How a driver run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverOutcome {
    /// `Done` was delivered.
    Completed,
    /// `Error` was delivered.
    Failed,
    /// The token was cancelled before a terminal event was delivered.
    Cancelled,
}

enum Flow {
    Continue,
    Ended(DriverOutcome),
}

/// Reads response bodies and drives them through the decode pipeline.
#[derive(Clone)]
pub struct SynthesisDriver {
    factory: Arc<dyn EngineFactory>,
    config: DecodeConfig,
}

impl SynthesisDriver {
    /// Create a driver that builds decode engines through `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidConfig`] if `config` does not validate.
    pub fn new(factory: Arc<dyn EngineFactory>, config: DecodeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { factory, config })
    }

    /// Create a driver backed by the in-process Symphonia engine.
    #[cfg(feature = "symphonia-engine")]
    pub fn with_symphonia(config: DecodeConfig) -> Result<Self> {
        Self::new(Arc::new(crate::engine::SymphoniaEngineFactory), config)
    }

    /// Active configuration.
    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Decode `body` and forward every event to `sink`.
    ///
    /// Read failures end the sequence with an `Error` event and
    /// [`DriverOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns the sink's error if delivery fails.
    #[instrument(skip_all)]
    pub async fn run<R, S>(
        &self,
        mut body: R,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<DriverOutcome>
    where
        R: AsyncRead + Unpin,
        S: SynthesisSink + ?Sized,
    {
        let mut buf = vec![0u8; self.config.read_chunk_bytes];
        let mut head = Vec::with_capacity(SNIFF_LEN.max(self.config.read_chunk_bytes));
        let mut eof = false;

        while head.len() < SNIFF_LEN {
            match read_some(&mut body, &mut buf, cancel).await {
                Ok(None) => {
                    info!("Synthesis cancelled before container was identified");
                    return Ok(DriverOutcome::Cancelled);
                }
                Ok(Some(0)) => {
                    eof = true;
                    break;
                }
                Ok(Some(n)) => head.extend_from_slice(&buf[..n]),
                Err(err) => return self.fail_early(err, sink, cancel),
            }
        }

        let format = ContainerFormat::sniff(&head);
        info!(?format, "Decoding synthesis response");

        let outcome = match format {
            ContainerFormat::WavPcm => {
                self.run_wav(head, eof, &mut body, &mut buf, sink, cancel)
                    .await?
            }
            ContainerFormat::MpegAudio | ContainerFormat::Unknown => {
                if format == ContainerFormat::Unknown {
                    warn!("Unrecognised container, scanning for MPEG frames");
                }
                self.run_mpeg(head, eof, &mut body, &mut buf, sink, cancel)
                    .await?
            }
        };

        info!(?outcome, "Synthesis run ended");
        Ok(outcome)
    }

    /// Decode a complete in-memory response.
    ///
    /// # Errors
    ///
    /// Returns the container, sync or engine error that ended decoding.
    #[instrument(skip_all, fields(len = bytes.len()))]
    pub fn decode_buffered(&self, bytes: &[u8]) -> Result<SynthesisResult> {
        decode_buffered(bytes, self.factory.clone(), &self.config)
    }

    async fn run_wav<R, S>(
        &self,
        head: Vec<u8>,
        mut eof: bool,
        body: &mut R,
        buf: &mut [u8],
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<DriverOutcome>
    where
        R: AsyncRead + Unpin,
        S: SynthesisSink + ?Sized,
    {
        let mut data = head;
        while !eof {
            match read_some(body, buf, cancel).await {
                Ok(None) => return Ok(DriverOutcome::Cancelled),
                Ok(Some(0)) => eof = true,
                Ok(Some(n)) => {
                    if data.len() + n > self.config.max_buffered_bytes {
                        let err = DecodeError::format(format!(
                            "WAV body exceeds {} bytes",
                            self.config.max_buffered_bytes
                        ));
                        return self.fail_early(err, sink, cancel);
                    }
                    data.extend_from_slice(&buf[..n]);
                }
                Err(err) => return self.fail_early(err, sink, cancel),
            }
        }

        debug!(bytes = data.len(), "WAV body fully buffered");
        let payload = match WavContainerParser::parse(&data) {
            Ok(payload) => payload,
            Err(err) => return self.fail_early(err, sink, cancel),
        };

        forward(wav_events(payload, self.config.wav_chunk_bytes), sink, cancel)
            .map(|flow| match flow {
                Flow::Ended(outcome) => outcome,
                // wav_events always ends with Done
                Flow::Continue => DriverOutcome::Completed,
            })
    }

    async fn run_mpeg<R, S>(
        &self,
        head: Vec<u8>,
        mut eof: bool,
        body: &mut R,
        buf: &mut [u8],
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<DriverOutcome>
    where
        R: AsyncRead + Unpin,
        S: SynthesisSink + ?Sized,
    {
        let mut sequencer = EventSequencer::new(self.factory.clone(), self.config.clone());

        let mut flow = forward(sequencer.process(&head), sink, cancel);
        while let Ok(Flow::Continue) = flow {
            flow = if eof {
                // finish always ends with a terminal event
                match forward(sequencer.finish(), sink, cancel) {
                    Ok(Flow::Continue) => Ok(Flow::Ended(DriverOutcome::Completed)),
                    other => other,
                }
            } else {
                match read_some(body, buf, cancel).await {
                    Ok(None) => Ok(Flow::Ended(DriverOutcome::Cancelled)),
                    Ok(Some(0)) => {
                        eof = true;
                        Ok(Flow::Continue)
                    }
                    Ok(Some(n)) => forward(sequencer.process(&buf[..n]), sink, cancel),
                    Err(err) => forward(sequencer.abort(err), sink, cancel),
                }
            };
        }

        sequencer.close();
        let stats = sequencer.stats();
        debug!(
            received = stats.bytes_received,
            frames = stats.frames_assembled,
            pcm_bytes = stats.pcm_bytes,
            "MPEG session closed"
        );

        flow.map(|flow| match flow {
            Flow::Ended(outcome) => outcome,
            Flow::Continue => DriverOutcome::Completed,
        })
    }

    fn fail_early<S>(
        &self,
        err: DecodeError,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<DriverOutcome>
    where
        S: SynthesisSink + ?Sized,
    {
        warn!(error = %err, "Synthesis failed before decoding started");
        match forward(std::iter::once(SynthesisEvent::from_error(err)), sink, cancel)? {
            Flow::Ended(outcome) => Ok(outcome),
            Flow::Continue => Ok(DriverOutcome::Failed),
        }
    }
}

/// Decode a complete in-memory response with engines from `factory`.
///
/// WAV bodies are parsed directly; anything else runs through a full MPEG
/// session and the PCM of every `Audio` event is concatenated.
pub fn decode_buffered(
    bytes: &[u8],
    factory: Arc<dyn EngineFactory>,
    config: &DecodeConfig,
) -> Result<SynthesisResult> {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if ContainerFormat::sniff(head) == ContainerFormat::WavPcm {
        let payload = WavContainerParser::parse(bytes)?;
        return Ok(SynthesisResult {
            pcm: payload.pcm,
            sample_rate: payload.format.sample_rate,
            channels: payload.format.channels,
            bits_per_sample: payload.format.bits_per_sample,
        });
    }

    let mut session = DecodeSession::new(factory, config.clone());
    let mut events = Vec::new();
    session.push(bytes, &mut events)?;
    session.finish(&mut events)?;

    let format = session
        .format()
        .ok_or(DecodeError::SyncNotFound {
            scanned: bytes.len() as u64,
        })?;

    Ok(SynthesisResult {
        pcm: collect_pcm(&events),
        sample_rate: format.sample_rate,
        channels: format.channels,
        bits_per_sample: format.bits_per_sample,
    })
}

/// Read once, giving up early if `cancel` fires. `Ok(None)` means cancelled.
async fn read_some<R>(
    body: &mut R,
    buf: &mut [u8],
    cancel: &CancellationToken,
) -> Result<Option<usize>>
where
    R: AsyncRead + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        read = body.read(buf) => Ok(Some(read?)),
    }
}

/// Deliver events in order, checking for cancellation before each one.
fn forward<S>(
    events: impl IntoIterator<Item = SynthesisEvent>,
    sink: &mut S,
    cancel: &CancellationToken,
) -> Result<Flow>
where
    S: SynthesisSink + ?Sized,
{
    for event in events {
        if cancel.is_cancelled() {
            debug!("Cancelled while delivering events");
            return Ok(Flow::Ended(DriverOutcome::Cancelled));
        }

        let ended = match &event {
            SynthesisEvent::Done => Some(DriverOutcome::Completed),
            SynthesisEvent::Error { .. } => Some(DriverOutcome::Failed),
            _ => None,
        };
        sink.deliver(event)?;

        if let Some(outcome) = ended {
            return Ok(Flow::Ended(outcome));
        }
    }
    Ok(Flow::Continue)
}
