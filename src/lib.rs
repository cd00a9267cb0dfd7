//! Workspace facade crate.
//!
//! Exposes feature flags that map to the individual workspace crates
//! (`core-decode`, `core-runtime`). Host applications can depend on
//! `tts-stream-workspace` and enable the documented features without wiring
//! each crate individually.

#[cfg(feature = "decode")]
pub use core_decode as decode;

#[cfg(feature = "runtime")]
pub use core_runtime as runtime;
