//! Error types for record extraction.

use std::io;

use thiserror::Error;

/// Result type for streaming operations.
pub type StreamingResult<T> = Result<T, StreamingError>;

/// A line that could not be parsed as a JSON object.
///
/// Recoverable: the extractor reports it, counts it, and moves on to the
/// next line.
#[derive(Debug, Error)]
#[error("Malformed line {line_number}: {source}")]
pub struct MalformedLine {
    /// 1-based physical line number in the decompressed stream
    pub line_number: u64,
    /// Why the line was rejected
    #[source]
    pub source: serde_json::Error,
}

/// Errors that can occur while extracting records.
#[derive(Debug, Error)]
pub enum StreamingError {
    /// IO error while reading the stream. Fatal: iteration stops.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A single line failed to parse. Iteration continues.
    #[error(transparent)]
    Malformed(#[from] MalformedLine),
}

impl StreamingError {
    /// Returns `true` if extraction can continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StreamingError::Malformed(_))
    }
}
