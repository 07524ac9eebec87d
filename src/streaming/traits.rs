//! Core traits for record extraction.
//!
//! - [`RecordIterator`] - Iterator with progress and count tracking
//! - [`StreamingConfig`] - Configuration options

use crate::core::Record;

use super::StreamingResult;

/// Running counts kept by a [`RecordIterator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Physical lines read, including blank and malformed ones
    pub lines_read: u64,
    /// Lines parsed into a record
    pub valid: u64,
    /// Lines that failed to parse
    pub malformed: u64,
    /// Lines skipped because they were empty after trimming
    pub empty: u64,
}

/// Iterator over records from a line-delimited JSON stream.
///
/// Extends the standard [`Iterator`] trait with methods for monitoring
/// extraction, useful for progress checkpoints and the final manifest.
///
/// Items are `Ok(record)` for every well-formed line,
/// `Err(StreamingError::Malformed(_))` for every line that failed to parse
/// (iteration continues), and a final `Err(StreamingError::Io(_))` if the
/// underlying reader fails (iteration stops).
///
/// # Object Safety
///
/// This trait is object-safe, enabling dynamic dispatch via `Box<dyn RecordIterator>`.
pub trait RecordIterator: Iterator<Item = StreamingResult<Record>> + Send {
    /// Returns the running `{valid, malformed}` counts.
    fn stats(&self) -> ExtractStats;

    /// Returns the number of bytes processed so far.
    fn bytes_processed(&self) -> u64;

    /// Returns the total stream size in bytes, if known.
    fn total_bytes(&self) -> Option<u64> {
        None
    }

    /// Returns approximate progress as a percentage (0.0 to 100.0).
    ///
    /// Returns `None` if progress cannot be determined (e.g., unknown size).
    fn progress(&self) -> Option<f64> {
        let total = self.total_bytes()?;
        if total == 0 {
            return None;
        }
        Some((self.bytes_processed() as f64 / total as f64) * 100.0)
    }
}

/// Configuration options for record extraction.
///
/// # Examples
///
/// ```
/// use logpack::streaming::StreamingConfig;
///
/// let config = StreamingConfig::new()
///     .with_buffer_size(128 * 1024)
///     .with_progress_interval(50_000);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StreamingConfig {
    /// Buffer size for reading the decompressed stream.
    ///
    /// Default: 64KB. Larger buffers improve throughput but use more memory.
    pub buffer_size: usize,

    /// Emit a progress checkpoint every N lines.
    ///
    /// Default: 10,000.
    pub progress_interval: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024, // 64KB
            progress_interval: 10_000,
        }
    }
}

impl StreamingConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the progress reporting interval.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }
}
