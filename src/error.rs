/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Error kinds for the engine, and the fatal-path sink for corruption.
//!
//! Transport-level non-errors (backpressure, shutdown) are *not* represented
//! here: see [`crate::ring_buffer::RingOutcome`].

use std::path::PathBuf;

/// The structured error taxonomy of the engine.
///
/// `Io` and `Config` errors are recoverable at the `main` boundary (they are
/// reported and the process exits with code 1). `Corruption` is not
/// recoverable: detecting it calls [`fatal`] directly and never returns.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corruption in {component}: expected magic {expected:#x}, observed {observed:#x}")]
    Corruption {
        component: &'static str,
        expected: u64,
        observed: u64,
    },
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Prints a red banner with the caller's location and aborts the process.
///
/// This is the single fatal-error sink referenced by
/// [`DESIGN.md`](../DESIGN.md): every place that detects a
/// [`EngineError::Corruption`] condition routes through here rather than
/// unwinding, matching the "abort after printing state" contract of the
/// corruption case in spec §7.
#[track_caller]
pub fn fatal(component: &str, message: &str) -> ! {
    let loc = std::panic::Location::caller();
    eprintln!("\x1b[1;31mFATAL [{component}] {file}:{line}: {message}\x1b[0m", file = loc.file(), line = loc.line());
    eprintln!("{}", std::backtrace::Backtrace::force_capture());
    std::process::abort();
}

pub type Result<T> = std::result::Result<T, EngineError>;
