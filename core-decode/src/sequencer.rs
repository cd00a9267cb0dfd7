//! # Event Sequencing
//!
//! Turns session output into a well-formed event sequence:
//!
//! - `Started` at most once, before any `Audio`
//! - exactly one terminal event (`Error` or `Done`), after which nothing is
//!   emitted
//! - the decode engine is released exactly once, through [`EventSequencer::close`],
//!   whichever way the sequence ends
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut sequencer = EventSequencer::new(factory, DecodeConfig::default());
//! for chunk in body {
//!     if cancel.is_cancelled() {
//!         break;
//!     }
//!     deliver(sequencer.process(&chunk));
//! }
//! deliver(sequencer.finish());
//! sequencer.close();
//! ```

use crate::config::DecodeConfig;
use crate::container::WavPayload;
use crate::engine::EngineFactory;
use crate::error::{DecodeError, Result};
use crate::events::{StreamFormat, SynthesisEvent};
use crate::session::{DecodeSession, SessionPhase, SessionStats};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Enforces the `Started → Audio* → (Error | Done)` protocol over a
/// [`DecodeSession`].
pub struct EventSequencer {
    session: DecodeSession,
    started: bool,
    terminated: bool,
    closed: bool,
}

impl EventSequencer {
    /// Create a sequencer around a fresh session.
    pub fn new(factory: Arc<dyn EngineFactory>, config: DecodeConfig) -> Self {
        Self {
            session: DecodeSession::new(factory, config),
            started: false,
            terminated: false,
            closed: false,
        }
    }

    /// Feed one chunk of the response body.
    ///
    /// Returns `Started` (first time a frame header is found), any `Audio`, and an
    /// `Error` if the chunk caused a failure. Returns nothing once a
    /// terminal event was produced.
    #[instrument(level = "trace", skip_all, fields(len = chunk.len()))]
    pub fn process(&mut self, chunk: &[u8]) -> Vec<SynthesisEvent> {
        if self.terminated {
            debug!("Dropping chunk after terminal event");
            return Vec::new();
        }

        let mut events = Vec::new();
        let result = self.session.push(chunk, &mut events);
        self.seal(events, result)
    }

    /// Signal end of input.
    ///
    /// Returns the remaining `Audio` followed by exactly one terminal event,
    /// or nothing if a terminal event was already produced. The engine is
    /// released before returning.
    #[instrument(level = "debug", skip_all)]
    pub fn finish(&mut self) -> Vec<SynthesisEvent> {
        if self.terminated {
            return Vec::new();
        }

        let mut events = Vec::new();
        let result = self.session.finish(&mut events);
        let mut events = self.seal(events, result);
        if !self.terminated {
            events.push(SynthesisEvent::Done);
            self.terminated = true;
        }
        self.close();
        events
    }

    /// End the sequence with `error` unless it already ended.
    pub fn abort(&mut self, error: DecodeError) -> Vec<SynthesisEvent> {
        if self.terminated {
            debug!(%error, "Ignoring abort after terminal event");
            return Vec::new();
        }
        let events = self.seal(Vec::new(), Err(error));
        self.close();
        events
    }

    /// Release the decode engine.
    ///
    /// Must be called on every exit path, including cancellation. Calling it
    /// again is a no-op. Does not emit any event.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.session.release();
        debug!(
            phase = ?self.session.phase(),
            terminated = self.terminated,
            "Event sequencer closed"
        );
    }

    /// Returns `true` once `Error` or `Done` was produced.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Returns `true` once [`close`](Self::close) ran.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stream format, once `Started` was produced.
    pub fn format(&self) -> Option<StreamFormat> {
        self.session.format()
    }

    /// Phase of the underlying session.
    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    /// Counters of the underlying session.
    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    fn seal(&mut self, events: Vec<SynthesisEvent>, result: Result<()>) -> Vec<SynthesisEvent> {
        let mut sealed = Vec::with_capacity(events.len() + 1);

        for event in events {
            match event {
                SynthesisEvent::Started(_) if self.started => {
                    debug!("Suppressing duplicate Started");
                }
                SynthesisEvent::Started(_) => {
                    self.started = true;
                    sealed.push(event);
                }
                SynthesisEvent::Audio(_) if !self.started => {
                    debug!("Suppressing Audio before Started");
                }
                event if event.is_terminal() => {
                    // Terminal events come from this type only
                    debug!(kind = event.kind(), "Suppressing terminal event from session");
                }
                event => sealed.push(event),
            }
        }

        if let Err(err) = result {
            error!(error = %err, "Decode session failed");
            sealed.push(SynthesisEvent::from_error(err));
            self.terminated = true;
            self.close();
        }

        sealed
    }
}

impl Drop for EventSequencer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Events for a fully parsed WAV response.
///
/// Yields `Started`, the PCM payload in slices of at most `slice_len` bytes
/// (zero-copy views into the payload), then `Done`.
pub fn wav_events(payload: WavPayload, slice_len: usize) -> impl Iterator<Item = SynthesisEvent> {
    let slice_len = slice_len.max(1);
    let pcm = payload.pcm;
    let slices = (0..pcm.len())
        .step_by(slice_len)
        .map(move |start| {
            let end = (start + slice_len).min(pcm.len());
            SynthesisEvent::Audio(pcm.slice(start..end))
        });

    std::iter::once(SynthesisEvent::Started(payload.format.stream_format()))
        .chain(slices)
        .chain(std::iter::once(SynthesisEvent::Done))
}

/// Concatenate the PCM payloads of `Audio` events.
pub fn collect_pcm<'a>(events: impl IntoIterator<Item = &'a SynthesisEvent>) -> Bytes {
    let mut pcm = Vec::new();
    for event in events {
        if let Some(chunk) = event.pcm() {
            pcm.extend_from_slice(chunk);
        }
    }
    Bytes::from(pcm)
}
