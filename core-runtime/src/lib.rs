//! # Core Runtime Module
//!
//! Shared runtime infrastructure for the synthesis pipeline:
//! - `tracing-subscriber` setup (pretty, JSON or compact output)
//! - Module-level filtering
//! - Mirroring of log records into a host logger through [`LogSink`]
//!
//! Decoding crates only emit `tracing` events; the host binary decides how
//! they are rendered by calling [`init_logging`] once at startup.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LogRecord, LogSink, LoggingConfig};
