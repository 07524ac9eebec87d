//! Core conversion logic for logpack.
//!
//! This module contains:
//! - [`models`] - Records, output chunks and the run manifest
//! - [`schema`] - Column resolution (static list or first record)
//! - [`output`] - The chunk-rotating CSV writer
//!
//! # Quick Start
//!
//! ```rust
//! use logpack::core::{Record, Schema, SchemaMode, SchemaResolver};
//!
//! let first: Record = serde_json::from_str(r#"{"host": "a", "status": 200}"#).unwrap();
//! let schema = SchemaResolver::new(SchemaMode::Dynamic).resolve(Some(&first));
//! assert_eq!(schema.columns(), ["host", "status"]);
//! ```

pub mod models;
pub mod output;
pub mod schema;

// Re-export main types for convenience
pub use models::{Manifest, OutputChunk, Record, render_value};
pub use output::{ChunkNaming, ChunkedCsvWriter, WriterState};
pub use schema::{CLOUDFLARE_LOG_COLUMNS, KeyAudit, Schema, SchemaMode, SchemaResolver};
