//! Error types for ytdlp-bridge
//!
//! This module provides the error taxonomy for the library:
//! - Orchestration errors raised synchronously from `execute` and its call
//!   patterns (`fetch_info`, `download`)
//! - Bootstrap errors raised while unpacking the bundled runtime
//!
//! All variants are expected to be caught once at the call boundary and
//! turned into user-visible messaging; the core never retries.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ytdlp-bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ytdlp-bridge
///
/// Each variant carries the context needed to diagnose the failure without
/// holding on to process state.
#[derive(Debug, Error)]
pub enum Error {
    /// The runtime bootstrap has not completed successfully
    #[error("engine not initialized: init() must succeed before execute")]
    NotInitialized,

    /// A request with the same identifier is already in flight
    #[error("request id already registered: {id}")]
    DuplicateRequest {
        /// The identifier that is already present in the process registry
        id: String,
    },

    /// The operating system refused to spawn the extraction process
    #[error("failed to start extraction process: {0}")]
    ProcessStart(#[source] std::io::Error),

    /// Waiting for the extraction process or its stream consumers failed
    #[error("interrupted while waiting for extraction process: {0}")]
    Interrupted(String),

    /// The request was cancelled externally while the process was running
    #[error("extraction cancelled for request {id}")]
    Cancelled {
        /// The identifier that was removed from the registry mid-flight
        id: String,
    },

    /// The extraction tool exited with a nonzero code
    #[error("extraction failed: {stderr}")]
    ExtractionFailed {
        /// The full captured standard-error text of the tool
        stderr: String,
    },

    /// Decoding the tool's structured output failed or yielded nothing usable
    #[error("failed to parse media info: {0}")]
    Parse(String),

    /// Runtime bootstrap failed
    #[error("bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runtime bootstrap errors
///
/// A bootstrap failure is fatal to the whole feature until retried. The
/// bootstrapper removes any partially-extracted directory before returning
/// one of these, so a retry starts clean.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The engine configuration carries no bootstrap section
    #[error("no bootstrap configuration provided")]
    MissingConfig,

    /// A bundled archive could not be opened or read
    #[error("failed to open archive {archive}: {reason}")]
    ArchiveOpen {
        /// Path to the bundled archive
        archive: PathBuf,
        /// The reason the archive could not be opened
        reason: String,
    },

    /// Extracting a bundled component into its target directory failed
    #[error("failed to extract {component} into {dir}: {reason}")]
    Extract {
        /// The bundled component being extracted (e.g. "python", "ffmpeg")
        component: &'static str,
        /// The target directory of the extraction
        dir: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// Installing a single-file component failed
    #[error("failed to install {component}: {reason}")]
    Install {
        /// The bundled component being installed (e.g. "tool")
        component: &'static str,
        /// The reason installation failed
        reason: String,
    },
}
