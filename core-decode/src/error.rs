//! # Decode Error Types
//!
//! Error types for container parsing, frame assembly and engine interaction.

use thiserror::Error;

/// Errors that can occur while turning a response body into PCM.
#[derive(Error, Debug)]
pub enum DecodeError {
    // ========================================================================
    // Container Errors
    // ========================================================================
    /// Container is malformed (bad RIFF/WAVE structure, non-PCM codec,
    /// oversized ID3 tag).
    #[error("Invalid audio container: {0}")]
    Format(String),

    /// No MPEG audio frame was found in everything the producer supplied.
    #[error("No MPEG audio frame found after {scanned} bytes")]
    SyncNotFound {
        /// Total number of bytes received before giving up.
        scanned: u64,
    },

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The decode engine reported a failure during offer/poll.
    #[error("Decode engine error: {0}")]
    Engine(String),

    /// The engine kept refusing input while producing no output.
    #[error("Decode engine stalled after {attempts} busy offers")]
    EngineStalled {
        /// Consecutive busy offers observed without any drainable output.
        attempts: u32,
    },

    /// The engine handle was used after it had been released.
    #[error("Decode engine already released")]
    EngineReleased,

    // ========================================================================
    // Driver Errors
    // ========================================================================
    /// The downstream consumer of synthesis events went away.
    #[error("Synthesis sink closed")]
    SinkClosed,

    /// Configuration rejected before a session was started.
    #[error("Invalid decode configuration: {0}")]
    InvalidConfig(String),

    /// Reading the response body failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Returns `true` for malformed-container and missing-sync errors.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            DecodeError::Format(_) | DecodeError::SyncNotFound { .. }
        )
    }

    /// Returns `true` if the failure originated in the decode engine.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            DecodeError::Engine(_) | DecodeError::EngineStalled { .. } | DecodeError::EngineReleased
        )
    }

    /// Returns `true` if the caller may retry the whole request.
    pub fn is_transient(&self) -> bool {
        matches!(self, DecodeError::Io(_))
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        DecodeError::Format(message.into())
    }

    pub(crate) fn engine(message: impl Into<String>) -> Self {
        DecodeError::Engine(message.into())
    }
}

/// Result type for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;
