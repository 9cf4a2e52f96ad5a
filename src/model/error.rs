//! Error types for chatwin.
//!
//! The windowing engine itself never surfaces errors: store, observer and
//! scroll failures degrade to defaults or to the remaining change sources and
//! are only logged. The types here cover the boundaries that can fail for
//! real: the settings store, replay scripts, and the binary as a whole.
//!
//! # Error Hierarchy
//!
//! - [`AppError`] - top-level error returned from the binary
//!   - [`ConfigError`] - config file read/parse failures
//!   - [`LoggingError`] - tracing subscriber initialisation
//!   - [`ScriptError`] - replay script parse/execution failures
//!   - [`StoreError`] - settings store unreachable or malformed
//!   - [`PatternError`] - locator pattern compilation

use crate::config::loader::ConfigError;
use crate::dom::PatternError;
use crate::logging::LoggingError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for the `chatwin` binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Config file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging could not be initialised.
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    /// A replay script failed.
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// The settings store failed outside the engine (e.g. during `--settings` setup).
    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),

    /// A configured locator pattern is invalid.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    /// Reading input or writing output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings store failures.
///
/// Inside the engine these are non-fatal: the cached settings fall back to
/// defaults and the failure is logged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is not reachable in this environment.
    #[error("settings store unavailable")]
    Unavailable,

    /// Reading or writing the backing file failed.
    #[error("failed to access settings file {path}: {source}")]
    Io {
        /// Backing file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not valid TOML.
    #[error("invalid settings file {path}: {reason}")]
    Malformed {
        /// Backing file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
}

/// Replay script failures.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A script line is not a valid step.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        message: String,
    },

    /// Delivering host events never settled.
    #[error("host loop did not settle after {rounds} rounds")]
    NoQuiescence {
        /// Rounds attempted.
        rounds: usize,
    },

    /// A step referred to chrome that does not exist (e.g. no bar on this route).
    #[error("step {step}: {what} is not present")]
    MissingTarget {
        /// 1-based step number.
        step: usize,
        /// What was missing.
        what: &'static str,
    },

    /// Locator patterns could not be compiled.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    /// A `settings` step could not write the store.
    #[error("settings store: {0}")]
    Store(#[from] StoreError),

    /// Reading the script or writing a report failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
