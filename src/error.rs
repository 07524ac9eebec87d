//! Unified error types for logpack.
//!
//! This module provides a single [`LogpackError`] enum that covers every
//! failure a conversion can hit, plus [`PipelineError`], which wraps a fatal
//! [`LogpackError`] with the [`Stage`] that failed and the [`PartialProgress`]
//! made before it did.
//!
//! # Error Handling Philosophy
//!
//! - **Parse-level** failures are recovered locally: a malformed input line is
//!   counted and skipped (see [`MalformedLine`](crate::streaming::MalformedLine)),
//!   it never reaches this enum as a fatal error.
//! - **I/O-level** failures abort the run. Chunks already closed stay on disk.
//! - **Cleanup** failures are reported as warnings on the manifest; they do not
//!   invalidate produced output.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::streaming::StreamingError;

/// A specialized [`Result`] type for logpack operations.
///
/// # Example
///
/// ```rust
/// use logpack::error::Result;
/// use logpack::core::Schema;
///
/// fn columns() -> Result<Schema> {
///     Ok(Schema::new(["a", "b"]))
/// }
/// ```
pub type Result<T> = std::result::Result<T, LogpackError>;

/// The error type for all logpack operations.
///
/// Each variant carries the context needed to act on it and, where
/// applicable, the underlying source error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogpackError {
    /// An I/O error occurred outside of chunk writing.
    ///
    /// Typical causes: the intermediate artifact cannot be created or read
    /// back, or the disk fills while decompressing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error, e.g. when loading a config file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error outside of a specific chunk.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration for '{field}': {message}")]
    InvalidConfig {
        /// Name of the offending option
        field: &'static str,
        /// Description of what's wrong
        message: String,
    },

    /// The compressed input archive does not exist.
    #[error("Input archive not found: {}", path.display())]
    InputNotFound {
        /// The path that was looked up
        path: PathBuf,
    },

    /// The requested codec was compiled out of this build.
    #[error("Compression codec '{codec}' is not enabled in this build")]
    UnsupportedCompression {
        /// Codec name (e.g. "zstd")
        codec: &'static str,
    },

    /// The compressed input is corrupt or truncated.
    ///
    /// Fatal: there is no partial recovery from a broken frame.
    #[error("Failed to decompress {codec} input{}: {source}", path.as_ref().map(|p| format!(" (file: {})", p.display())).unwrap_or_default())]
    Decompression {
        /// Codec that was decoding
        codec: &'static str,
        /// The input path, if known
        path: Option<PathBuf>,
        /// The underlying decoder error
        #[source]
        source: io::Error,
    },

    /// Writing an output chunk failed (disk full, permission denied, ...).
    ///
    /// Fatal. No retry is attempted and closed chunks are left in place.
    #[error("Failed to write chunk {}: {source}", path.display())]
    Write {
        /// The chunk being written
        path: PathBuf,
        /// The underlying writer error
        #[source]
        source: csv::Error,
    },

    /// Removing an intermediate or source artifact failed.
    ///
    /// Surfaced as a warning; produced output stays valid.
    #[error("Failed to remove {artifact} artifact {}: {source}", path.display())]
    Cleanup {
        /// Which artifact ("intermediate" or "source")
        artifact: &'static str,
        /// Path that could not be removed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The run was cancelled through a [`CancellationToken`](crate::cancel::CancellationToken).
    #[error("Run cancelled")]
    Cancelled,

    /// Record extraction failed while reading the decompressed stream.
    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl LogpackError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        LogpackError::InvalidConfig {
            field,
            message: message.into(),
        }
    }

    /// Creates a decompression error.
    pub fn decompression(codec: &'static str, path: Option<PathBuf>, source: io::Error) -> Self {
        LogpackError::Decompression {
            codec,
            path,
            source,
        }
    }

    /// Creates a chunk write error.
    pub fn write(path: impl Into<PathBuf>, source: impl Into<csv::Error>) -> Self {
        LogpackError::Write {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Creates a cleanup error.
    pub fn cleanup(artifact: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        LogpackError::Cleanup {
            artifact,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this is an IO error.
    pub fn is_io(&self) -> bool {
        matches!(self, LogpackError::Io(_))
    }

    /// Returns `true` if this is a decompression error.
    pub fn is_decompression(&self) -> bool {
        matches!(self, LogpackError::Decompression { .. })
    }

    /// Returns `true` if this is a chunk write error.
    pub fn is_write(&self) -> bool {
        matches!(self, LogpackError::Write { .. })
    }

    /// Returns `true` if this is a cleanup error.
    pub fn is_cleanup(&self) -> bool {
        matches!(self, LogpackError::Cleanup { .. })
    }

    /// Returns `true` if this is a configuration error.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, LogpackError::InvalidConfig { .. })
    }

    /// Returns `true` if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LogpackError::Cancelled)
    }
}

// ============================================================================
// Pipeline failures
// ============================================================================

/// Pipeline stage in which a fatal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Configuration and input checks before any work is done.
    Validate,
    /// Decompressing the archive into the intermediate artifact.
    Decompress,
    /// Reading records back from the intermediate artifact.
    Extract,
    /// Writing CSV chunks.
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validate => write!(f, "validate"),
            Stage::Decompress => write!(f, "decompress"),
            Stage::Extract => write!(f, "extract"),
            Stage::Write => write!(f, "write"),
        }
    }
}

/// Work completed before a run aborted.
///
/// Lets callers decide whether to re-run or accept the partial output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartialProgress {
    /// Chunks that were fully written and closed
    pub chunks_completed: Vec<PathBuf>,
    /// Data rows written across all chunks, including the one open at failure
    pub rows_written: u64,
    /// Malformed lines skipped so far
    pub malformed_lines: u64,
}

/// A fatal pipeline failure: which stage failed, how far the run got, and why.
#[derive(Debug, Error)]
#[error(
    "{stage} stage failed after {} completed chunk(s) and {} row(s): {source}",
    progress.chunks_completed.len(),
    progress.rows_written
)]
pub struct PipelineError {
    /// The stage that failed
    pub stage: Stage,
    /// Progress made before the failure
    pub progress: PartialProgress,
    /// The underlying error
    #[source]
    pub source: LogpackError,
}

impl PipelineError {
    /// Creates a pipeline error for `stage`.
    pub fn new(stage: Stage, progress: PartialProgress, source: LogpackError) -> Self {
        Self {
            stage,
            progress,
            source,
        }
    }

    /// Returns `true` if the run was cancelled rather than failing.
    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }
}

// ============================================================================
// Tests
// ============================================================================
