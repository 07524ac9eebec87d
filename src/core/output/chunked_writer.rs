//! Size-bounded CSV output with chunk rotation.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::models::{OutputChunk, Record};
use crate::core::schema::Schema;
use crate::error::{LogpackError, Result};

/// Deterministic chunk file naming: `{base}_{index}.csv` or
/// `{base}_{index}_{timestamp}.csv`, inside `directory`.
///
/// # Example
///
/// ```
/// use logpack::core::output::ChunkNaming;
/// use std::path::Path;
///
/// let naming = ChunkNaming::new("out", "export").with_timestamp("2024-05-01_10-00-00");
/// assert_eq!(
///     naming.path_for(2),
///     Path::new("out/export_2_2024-05-01_10-00-00.csv")
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkNaming {
    directory: PathBuf,
    base: String,
    timestamp: Option<String>,
}

impl ChunkNaming {
    pub fn new(directory: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base: base.into(),
            timestamp: None,
        }
    }

    /// Appends a run timestamp to every chunk name.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    /// File name of chunk `index` (1-based).
    pub fn file_name(&self, index: usize) -> String {
        match &self.timestamp {
            Some(ts) => format!("{}_{}_{}.csv", self.base, index, ts),
            None => format!("{}_{}.csv", self.base, index),
        }
    }

    /// Full path of chunk `index` (1-based).
    pub fn path_for(&self, index: usize) -> PathBuf {
        self.directory.join(self.file_name(index))
    }
}

/// Observable state of a [`ChunkedCsvWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// A chunk is open and accepting rows.
    ChunkOpen { index: usize, rows: u64 },
    /// The previous chunk filled up; chunk `next_index` opens on the next record.
    AwaitingRecord { next_index: usize },
}

impl WriterState {
    /// Index of the chunk that the next row goes to.
    pub fn chunk_index(&self) -> usize {
        match *self {
            WriterState::ChunkOpen { index, .. } => index,
            WriterState::AwaitingRecord { next_index } => next_index,
        }
    }
}

struct OpenChunk {
    index: usize,
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: u64,
    header_written: bool,
}

/// Writes records as CSV rows, rotating to a new file every `rows_per_chunk` rows.
///
/// Chunk 1 and its header are created as soon as the writer is, so a run with
/// no records still leaves one header-only file. The row threshold is
/// inclusive: the row that brings a chunk to `rows_per_chunk` is written to
/// that chunk, which is then closed. The next chunk is opened when the next
/// record arrives, so an exact multiple of `rows_per_chunk` never leaves a
/// trailing header-only file.
///
/// With an empty schema no header and no data lines are written; records
/// still count towards `rows_per_chunk`.
///
/// Only one file handle is open at any time. Closed chunks are immutable and
/// stay on disk if a later write fails.
///
/// # Example
///
/// ```rust,no_run
/// use logpack::core::{Record, Schema};
/// use logpack::core::output::{ChunkNaming, ChunkedCsvWriter};
///
/// let naming = ChunkNaming::new("out", "export");
/// let mut writer = ChunkedCsvWriter::create(naming, Schema::new(["a", "b"]), 2, b',')?;
///
/// for line in [r#"{"a":1,"b":2}"#, r#"{"a":3}"#, r#"{"b":4}"#] {
///     let record: Record = serde_json::from_str(line)?;
///     writer.write_record(&record)?;
/// }
///
/// let chunks = writer.finish()?;
/// assert_eq!(chunks.len(), 2);
/// # Ok::<(), logpack::LogpackError>(())
/// ```
pub struct ChunkedCsvWriter {
    naming: ChunkNaming,
    schema: Schema,
    rows_per_chunk: u64,
    delimiter: u8,
    current: Option<OpenChunk>,
    next_index: usize,
    closed: Vec<OutputChunk>,
    rows_written: u64,
    row: csv::ByteRecord,
}

impl ChunkedCsvWriter {
    /// Creates the output directory if needed and opens chunk 1 with its header.
    ///
    /// # Errors
    ///
    /// Returns [`LogpackError::InvalidConfig`] if `rows_per_chunk` is zero and
    /// [`LogpackError::Write`] if the directory or first chunk cannot be created.
    pub fn create(
        naming: ChunkNaming,
        schema: Schema,
        rows_per_chunk: u64,
        delimiter: u8,
    ) -> Result<Self> {
        if rows_per_chunk == 0 {
            return Err(LogpackError::invalid_config(
                "rows_per_chunk",
                "must be greater than zero",
            ));
        }

        fs::create_dir_all(naming.directory())
            .map_err(|e| LogpackError::write(naming.directory(), e))?;

        let mut writer = Self {
            naming,
            schema,
            rows_per_chunk,
            delimiter,
            current: None,
            next_index: 1,
            closed: Vec::new(),
            rows_written: 0,
            row: csv::ByteRecord::new(),
        };
        let first = writer.open_chunk(1)?;
        writer.current = Some(first);
        Ok(writer)
    }

    fn open_chunk(&self, index: usize) -> Result<OpenChunk> {
        let path = self.naming.path_for(index);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(&path)
            .map_err(|e| LogpackError::write(&path, e))?;

        let header_written = !self.schema.is_empty();
        if header_written {
            writer
                .write_record(self.schema.columns())
                .map_err(|e| LogpackError::write(&path, e))?;
        }

        debug!(chunk = index, path = %path.display(), "opened chunk");
        Ok(OpenChunk {
            index,
            path,
            writer,
            rows: 0,
            header_written,
        })
    }

    /// Writes one record as a row, rotating afterwards if the chunk is full.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let chunk = match self.current.take() {
            Some(chunk) => chunk,
            None => self.open_chunk(self.next_index)?,
        };
        let chunk = self.current.insert(chunk);

        // Rows of a zero-column schema have no CSV line; they are only counted.
        if !self.schema.is_empty() {
            self.row.clear();
            for cell in self.schema.project(record) {
                self.row.push_field(cell.as_bytes());
            }
            chunk
                .writer
                .write_byte_record(&self.row)
                .map_err(|e| LogpackError::write(&chunk.path, e))?;
        }

        chunk.rows += 1;
        self.rows_written += 1;

        if chunk.rows == self.rows_per_chunk {
            self.close_current()?;
        }
        Ok(())
    }

    fn close_current(&mut self) -> Result<()> {
        let Some(mut chunk) = self.current.take() else {
            return Ok(());
        };

        chunk
            .writer
            .flush()
            .map_err(|e| LogpackError::write(&chunk.path, e))?;

        info!(
            chunk = chunk.index,
            rows = chunk.rows,
            path = %chunk.path.display(),
            "chunk complete"
        );

        self.next_index = chunk.index + 1;
        self.closed.push(OutputChunk {
            index: chunk.index,
            path: chunk.path,
            rows: chunk.rows,
            header_written: chunk.header_written,
        });
        Ok(())
    }

    /// Closes the open chunk, if any, and returns every chunk in order.
    pub fn finish(mut self) -> Result<Vec<OutputChunk>> {
        self.close_current()?;
        Ok(std::mem::take(&mut self.closed))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Data rows written so far, across all chunks.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Chunks closed so far.
    pub fn completed_chunks(&self) -> &[OutputChunk] {
        &self.closed
    }

    pub fn state(&self) -> WriterState {
        match &self.current {
            Some(chunk) => WriterState::ChunkOpen {
                index: chunk.index,
                rows: chunk.rows,
            },
            None => WriterState::AwaitingRecord {
                next_index: self.next_index,
            },
        }
    }
}

impl Drop for ChunkedCsvWriter {
    fn drop(&mut self) {
        if let Some(chunk) = self.current.as_mut() {
            if let Err(e) = chunk.writer.flush() {
                warn!(path = %chunk.path.display(), error = %e, "failed to flush open chunk");
            }
        }
    }
}
