//! # Decode Configuration
//!
//! Tunables for the decode pipeline and the synthesis driver.

use crate::error::{DecodeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Decode pipeline configuration.
///
/// Controls read sizes, engine timeouts and memory bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Size of each read from the response body.
    ///
    /// Default: 8 KB.
    #[serde(default = "default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,

    /// Maximum payload of a single Audio event on the WAV path.
    ///
    /// Default: 8 KB.
    #[serde(default = "default_wav_chunk_bytes")]
    pub wav_chunk_bytes: usize,

    /// Upper bound on a single `offer` and on each poll made while feeding.
    ///
    /// Default: 5 ms.
    #[serde(default = "default_offer_timeout")]
    pub offer_timeout: Duration,

    /// Upper bound on each poll made while draining after end of stream.
    ///
    /// Default: 10 ms.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: Duration,

    /// Total time the final drain may take before giving up on the engine.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_final_drain_budget")]
    pub final_drain_budget: Duration,

    /// Consecutive busy offers with nothing to drain before the engine is
    /// declared stalled.
    ///
    /// Default: 200.
    #[serde(default = "default_max_stalled_offers")]
    pub max_stalled_offers: u32,

    /// Output queue depth of the in-process engine, in decoded frames.
    ///
    /// Default: 8.
    #[serde(default = "default_engine_queue_depth")]
    pub engine_queue_depth: usize,

    /// Cap on a fully-buffered WAV body and on the MPEG backlog.
    ///
    /// Default: 32 MB.
    #[serde(default = "default_max_buffered_bytes")]
    pub max_buffered_bytes: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            read_chunk_bytes: default_read_chunk_bytes(),
            wav_chunk_bytes: default_wav_chunk_bytes(),
            offer_timeout: default_offer_timeout(),
            drain_timeout: default_drain_timeout(),
            final_drain_budget: default_final_drain_budget(),
            max_stalled_offers: default_max_stalled_offers(),
            engine_queue_depth: default_engine_queue_depth(),
            max_buffered_bytes: default_max_buffered_bytes(),
        }
    }
}

impl DecodeConfig {
    /// Configuration for interactive playback where first audio matters most.
    ///
    /// - Smaller reads so the first frame surfaces sooner
    /// - Shorter engine waits
    pub fn low_latency() -> Self {
        Self {
            read_chunk_bytes: 2048,
            wav_chunk_bytes: 4096,
            offer_timeout: Duration::from_millis(2),
            drain_timeout: Duration::from_millis(5),
            final_drain_budget: Duration::from_millis(500),
            ..Default::default()
        }
    }

    /// Configuration for slow or heavily loaded decode engines.
    pub fn tolerant() -> Self {
        Self {
            offer_timeout: Duration::from_millis(20),
            drain_timeout: Duration::from_millis(50),
            final_drain_budget: Duration::from_secs(10),
            max_stalled_offers: 1000,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_bytes == 0 {
            return Err(invalid("read_chunk_bytes must be > 0"));
        }

        if self.wav_chunk_bytes == 0 {
            return Err(invalid("wav_chunk_bytes must be > 0"));
        }

        if self.max_stalled_offers == 0 {
            return Err(invalid("max_stalled_offers must be > 0"));
        }

        if self.engine_queue_depth == 0 {
            return Err(invalid("engine_queue_depth must be > 0"));
        }

        if self.drain_timeout > self.final_drain_budget {
            return Err(invalid("drain_timeout cannot exceed final_drain_budget"));
        }

        if self.max_buffered_bytes < self.read_chunk_bytes {
            return Err(invalid("max_buffered_bytes cannot be smaller than read_chunk_bytes"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> DecodeError {
    DecodeError::InvalidConfig(message.to_string())
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_read_chunk_bytes() -> usize {
    8 * 1024
}

fn default_wav_chunk_bytes() -> usize {
    8 * 1024
}

fn default_offer_timeout() -> Duration {
    Duration::from_millis(5)
}

fn default_drain_timeout() -> Duration {
    Duration::from_millis(10)
}

fn default_final_drain_budget() -> Duration {
    Duration::from_secs(2)
}

fn default_max_stalled_offers() -> u32 {
    200
}

fn default_engine_queue_depth() -> usize {
    8
}

fn default_max_buffered_bytes() -> usize {
    32 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DecodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.read_chunk_bytes, 8192);
        assert_eq!(config.wav_chunk_bytes, 8192);
        assert_eq!(config.offer_timeout, Duration::from_millis(5));
        assert_eq!(config.drain_timeout, Duration::from_millis(10));
    }

    #[test]
    fn test_presets_are_valid() {
        let low = DecodeConfig::low_latency();
        assert!(low.validate().is_ok());
        assert!(low.read_chunk_bytes < DecodeConfig::default().read_chunk_bytes);

        let tolerant = DecodeConfig::tolerant();
        assert!(tolerant.validate().is_ok());
        assert!(tolerant.max_stalled_offers > DecodeConfig::default().max_stalled_offers);
    }

    #[test]
    fn test_config_validation() {
        let mut config = DecodeConfig::default();

        config.read_chunk_bytes = 0;
        assert!(matches!(config.validate(), Err(DecodeError::InvalidConfig(_))));
        config.read_chunk_bytes = 8192;

        config.drain_timeout = Duration::from_secs(5);
        assert!(config.validate().is_err());
        config.drain_timeout = Duration::from_millis(10);

        config.max_buffered_bytes = 16;
        assert!(config.validate().is_err());
        config.max_buffered_bytes = default_max_buffered_bytes();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: DecodeConfig =
            serde_json::from_str(r#"{ "wav_chunk_bytes": 1024 }"#).unwrap();
        assert_eq!(config.wav_chunk_bytes, 1024);
        assert_eq!(config.read_chunk_bytes, 8192);
        assert_eq!(config.max_stalled_offers, 200);
    }
}
