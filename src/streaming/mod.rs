//! Streaming record extraction from decompressed log streams.
//!
//! Decompressed archives can be far larger than memory, so records are pulled
//! one line at a time and never collected.
//!
//! # Architecture
//!
//! - [`RecordIterator`] — iterator of records with running counts
//! - [`JsonlRecordIterator`] — the line-delimited JSON implementation
//! - [`MalformedLine`] — the recoverable per-line failure
//!
//! # Example
//!
//! ```rust,no_run
//! use logpack::streaming::{JsonlRecordIterator, RecordIterator, StreamingConfig, StreamingError};
//!
//! let mut records = JsonlRecordIterator::open(
//!     "decompressed.jsonl".as_ref(),
//!     &StreamingConfig::default(),
//! )?;
//!
//! for item in records.by_ref() {
//!     match item {
//!         Ok(record) => println!("{} fields", record.len()),
//!         Err(StreamingError::Malformed(line)) => eprintln!("skipped: {line}"),
//!         Err(fatal) => return Err(fatal.into()),
//!     }
//! }
//! println!("{} malformed", records.stats().malformed);
//! # Ok::<(), logpack::LogpackError>(())
//! ```
//!
//! # Memory Usage
//!
//! Peak memory is the read buffer plus the longest line, independent of the
//! stream length.

mod error;
mod jsonl;
mod traits;

pub use error::{MalformedLine, StreamingError, StreamingResult};
pub use jsonl::JsonlRecordIterator;
pub use traits::{ExtractStats, RecordIterator, StreamingConfig};
