//! Progress checkpoints for long-running conversions.
//!
//! The pipeline emits a [`Progress`] snapshot every `progress_interval` lines.
//! Checkpoints are observability only: they never influence control flow.
//!
//! # Example
//!
//! ```rust
//! use logpack::progress::{Progress, ProgressCallback};
//! use std::sync::Arc;
//!
//! let callback: ProgressCallback = Arc::new(|progress| {
//!     if let Some(pct) = progress.percentage() {
//!         println!("{:.1}% ({} rows)", pct, progress.records_written);
//!     }
//! });
//!
//! callback(Progress {
//!     lines_read: 10_000,
//!     bytes_processed: 500,
//!     total_bytes: Some(1000),
//!     ..Progress::default()
//! });
//! ```

use std::sync::Arc;

use tracing::info;

/// Snapshot of a run in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Physical lines read from the decompressed stream
    pub lines_read: u64,

    /// Bytes of the decompressed stream consumed so far
    pub bytes_processed: u64,

    /// Size of the decompressed stream, if known
    pub total_bytes: Option<u64>,

    /// Rows written across all chunks
    pub records_written: u64,

    /// Malformed lines skipped so far
    pub malformed_lines: u64,

    /// Index of the chunk currently being filled
    pub current_chunk: usize,
}

impl Progress {
    /// Returns the progress as a percentage (0.0 - 100.0).
    ///
    /// Returns `None` if total bytes is not known.
    ///
    /// ```rust
    /// use logpack::progress::Progress;
    ///
    /// let progress = Progress { bytes_processed: 250, total_bytes: Some(1000), ..Progress::default() };
    /// assert_eq!(progress.percentage(), Some(25.0));
    /// ```
    pub fn percentage(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.bytes_processed as f64 / total as f64) * 100.0
            }
        })
    }

    /// Returns whether the whole stream has been consumed.
    pub fn is_complete(&self) -> bool {
        self.total_bytes
            .map(|total| self.bytes_processed >= total)
            .unwrap_or(false)
    }

    /// Returns the remaining bytes to process.
    pub fn remaining_bytes(&self) -> Option<u64> {
        self.total_bytes
            .map(|total| total.saturating_sub(self.bytes_processed))
    }
}

/// Callback type for receiving progress checkpoints.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Creates a no-op progress callback.
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Creates a progress callback that logs each checkpoint at `info` level.
pub fn log_progress() -> ProgressCallback {
    Arc::new(|progress| {
        info!(
            lines = progress.lines_read,
            rows = progress.records_written,
            malformed = progress.malformed_lines,
            chunk = progress.current_chunk,
            percent = ?progress.percentage(),
            "progress checkpoint"
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(bytes_processed: u64, total_bytes: Option<u64>) -> Progress {
        Progress {
            bytes_processed,
            total_bytes,
            ..Progress::default()
        }
    }

    #[test]
    fn test_progress_percentage() {
        assert_eq!(at(500, Some(1000)).percentage(), Some(50.0));
        assert_eq!(at(500, None).percentage(), None);
        assert_eq!(at(0, Some(0)).percentage(), Some(100.0));
    }

    #[test]
    fn test_progress_is_complete() {
        assert!(at(1000, Some(1000)).is_complete());
        assert!(!at(500, Some(1000)).is_complete());
        assert!(!at(500, None).is_complete());
    }

    #[test]
    fn test_progress_remaining_bytes() {
        assert_eq!(at(300, Some(1000)).remaining_bytes(), Some(700));
        assert_eq!(at(300, None).remaining_bytes(), None);
    }

    #[test]
    fn test_no_progress_callback() {
        let callback = no_progress();
        callback(Progress::default());
    }

    #[test]
    fn test_log_progress_callback() {
        let callback = log_progress();
        callback(at(10, Some(20)));
    }

    #[test]
    fn test_progress_callback_type() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let counter = Arc::new(AtomicU64::new(0));
        let counter_clone = counter.clone();

        let callback: ProgressCallback = Arc::new(move |progress| {
            counter_clone.store(progress.lines_read, Ordering::SeqCst);
        });

        callback(Progress {
            lines_read: 42,
            ..Progress::default()
        });
        assert_eq!(counter.load(Ordering::SeqCst), 42);
    }
}
