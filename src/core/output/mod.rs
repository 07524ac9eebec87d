//! Chunked CSV output.
//!
//! - [`ChunkedCsvWriter`] - writes rows, rotating files at a row threshold
//! - [`ChunkNaming`] - deterministic `{base}_{index}[_{timestamp}].csv` names
//! - [`WriterState`] - which chunk is open, or which opens next
//!
//! # Example
//!
//! ```rust,no_run
//! use logpack::core::Schema;
//! use logpack::core::output::{ChunkNaming, ChunkedCsvWriter};
//!
//! let naming = ChunkNaming::new("exports", "Exported_data_part");
//! let writer = ChunkedCsvWriter::create(naming, Schema::new(["timestamp", "url"]), 1_000_000, b',')?;
//! let chunks = writer.finish()?;
//! println!("{} chunk(s)", chunks.len());
//! # Ok::<(), logpack::LogpackError>(())
//! ```

mod chunked_writer;

pub use chunked_writer::{ChunkNaming, ChunkedCsvWriter, WriterState};
