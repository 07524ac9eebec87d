//! # Logpack
//!
//! A Rust library for converting compressed, newline-delimited JSON log
//! archives into row-limited CSV chunks.
//!
//! ## Overview
//!
//! Logpack streams an archive through four stages:
//! - **Decompress** — Zstandard, gzip or plain input into an intermediate file
//! - **Extract** — one JSON object per line, malformed lines skipped and counted
//! - **Resolve schema** — a fixed column list, or the keys of the first record
//! - **Write** — CSV rows, rotating to a new file every `rows_per_chunk` rows
//!
//! Memory stays bounded by the transfer buffer plus one record, so archives
//! far larger than RAM convert fine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logpack::prelude::*;
//!
//! fn main() -> std::result::Result<(), PipelineError> {
//!     let config = PipelineConfig::new("Test_Log.zst", "exports")
//!         .with_output_base("Exported_data_part")
//!         .with_rows_per_chunk(SPREADSHEET_ROWS_PER_CHUNK)
//!         .with_schema_mode(SchemaMode::cloudflare())
//!         .with_timestamp_suffix(true);
//!
//!     let manifest = Pipeline::new(config).run()?;
//!     println!(
//!         "{} rows in {} files, {} malformed lines",
//!         manifest.total_records,
//!         manifest.chunk_count(),
//!         manifest.malformed_lines
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming Records Directly
//!
//! The record extractor works over any [`BufRead`](std::io::BufRead):
//!
//! ```rust
//! use logpack::streaming::{JsonlRecordIterator, RecordIterator};
//!
//! let input = "{\"a\":1}\nnot json\n\n{\"a\":2}\n";
//! let mut records = JsonlRecordIterator::new(input.as_bytes());
//! let valid: Vec<_> = records.by_ref().filter_map(Result::ok).collect();
//!
//! assert_eq!(valid.len(), 2);
//! assert_eq!(records.stats().malformed, 1);
//! ```
//!
//! ## Module Structure
//!
//! - [`pipeline`] — [`Pipeline`], the stage orchestrator
//! - [`config`] — [`PipelineConfig`] and defaults
//! - [`decompress`] — [`Decompressor`](decompress::Decompressor), [`Compression`](decompress::Compression)
//! - [`streaming`] — [`JsonlRecordIterator`](streaming::JsonlRecordIterator), extraction stats
//! - [`core`](crate::core) — records, schema resolution, chunked CSV output, [`Manifest`]
//! - [`progress`] — progress checkpoints and callbacks
//! - [`cancel`] — [`CancellationToken`](cancel::CancellationToken)
//! - [`error`] — [`LogpackError`], [`PipelineError`], [`Stage`]
//! - [`cli`] — CLI argument definition (feature `cli`)
//! - [`prelude`] — Convenient re-exports

pub mod cancel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod decompress;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod streaming;

// Re-export the main types at the crate root for convenience
pub use crate::config::PipelineConfig;
pub use crate::core::Manifest;
pub use crate::error::{LogpackError, PipelineError, Result, Stage};
pub use crate::pipeline::Pipeline;

/// Convenient re-exports for common usage.
///
/// ```rust
/// use logpack::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{LogpackError, PartialProgress, PipelineError, Result, Stage};

    pub use crate::config::{DEFAULT_ROWS_PER_CHUNK, PipelineConfig, SPREADSHEET_ROWS_PER_CHUNK};
    pub use crate::pipeline::Pipeline;

    pub use crate::core::{
        CLOUDFLARE_LOG_COLUMNS, ChunkNaming, ChunkedCsvWriter, Manifest, OutputChunk, Record,
        Schema, SchemaMode,
    };
    pub use crate::decompress::{Compression, Decompressor};
    pub use crate::streaming::{JsonlRecordIterator, RecordIterator};

    pub use crate::cancel::CancellationToken;
    pub use crate::progress::{Progress, ProgressCallback};
}
