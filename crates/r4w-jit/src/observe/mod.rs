//! # Observability
//!
//! The queue reports through `tracing`: accepted frames, ASAP placement and
//! peek hits at debug level, stale drops as warnings, bookkeeping faults as
//! errors. Counters live in [`crate::stats::JitStats`].
//!
//! This module only wires up a subscriber for binaries and tests that want
//! to see those events.
//!
//! ```rust,ignore
//! use r4w_jit::observe::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development());
//! tracing::info!(capacity = 32, "JIT queue ready");
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
