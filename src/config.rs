//! Configuration for a conversion run.
//!
//! All paths and knobs live in one [`PipelineConfig`] handed to the pipeline
//! at construction; nothing is read from process-wide state.
//!
//! # Example
//!
//! ```rust
//! use logpack::config::{PipelineConfig, SPREADSHEET_ROWS_PER_CHUNK};
//! use logpack::core::SchemaMode;
//!
//! let config = PipelineConfig::new("input/Test_Log.zst", "exports")
//!     .with_output_base("Exported_data_part")
//!     .with_rows_per_chunk(SPREADSHEET_ROWS_PER_CHUNK)
//!     .with_schema_mode(SchemaMode::cloudflare())
//!     .with_timestamp_suffix(true);
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! Configurations can also be loaded from JSON; omitted fields take their
//! defaults:
//!
//! ```rust
//! use logpack::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_json_str(r#"{
//!     "input": "logs.zst",
//!     "output_dir": "out",
//!     "rows_per_chunk": 500000,
//!     "schema_mode": {"static": ["timestamp", "host"]},
//!     "delete_source": true
//! }"#)?;
//! assert_eq!(config.rows_per_chunk, 500_000);
//! assert!(config.delete_intermediate);
//! # Ok::<(), logpack::LogpackError>(())
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::SchemaMode;
use crate::decompress::{Compression, DEFAULT_BUFFER_SIZE};
use crate::error::{LogpackError, Result};
use crate::streaming::StreamingConfig;

/// Default rows per output chunk.
pub const DEFAULT_ROWS_PER_CHUNK: u64 = 1_000_000;

/// Rows per chunk that keep each file within a spreadsheet's row limit
/// (1,048,576 rows including the header).
pub const SPREADSHEET_ROWS_PER_CHUNK: u64 = 1_048_575;

/// Default progress checkpoint interval, in lines.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10_000;

/// Configuration for one conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Compressed input archive
    pub input: PathBuf,

    /// Directory for CSV chunks (created if missing)
    pub output_dir: PathBuf,

    /// Chunk file name prefix (default: "export")
    pub output_base: String,

    /// Where the decompressed stream is staged.
    ///
    /// Default: `{output_dir}/{output_base}.decompressed.jsonl`
    pub intermediate_path: Option<PathBuf>,

    /// Maximum data rows per chunk, inclusive (default: 1,000,000)
    pub rows_per_chunk: u64,

    /// How columns are chosen (default: dynamic)
    pub schema_mode: SchemaMode,

    /// Delete the decompressed intermediate after a successful run (default: true)
    pub delete_intermediate: bool,

    /// Delete the compressed input after a successful run (default: false)
    pub delete_source: bool,

    /// Append a run timestamp to every chunk name (default: false)
    pub timestamp_suffix: bool,

    /// Input codec (default: auto-detect)
    pub compression: Compression,

    /// I/O buffer size in bytes (default: 64KB)
    pub buffer_size: usize,

    /// Progress checkpoint interval in lines (default: 10,000)
    pub progress_interval: usize,

    /// CSV field delimiter (default: `,`)
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output_dir: PathBuf::from("."),
            output_base: "export".to_string(),
            intermediate_path: None,
            rows_per_chunk: DEFAULT_ROWS_PER_CHUNK,
            schema_mode: SchemaMode::Dynamic,
            delete_intermediate: true,
            delete_source: false,
            timestamp_suffix: false,
            compression: Compression::Auto,
            buffer_size: DEFAULT_BUFFER_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            delimiter: ',',
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults for everything but the paths.
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Parses a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Sets the chunk file name prefix.
    #[must_use]
    pub fn with_output_base(mut self, base: impl Into<String>) -> Self {
        self.output_base = base.into();
        self
    }

    /// Sets where the decompressed stream is staged.
    #[must_use]
    pub fn with_intermediate_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.intermediate_path = Some(path.into());
        self
    }

    /// Sets the maximum rows per chunk.
    #[must_use]
    pub fn with_rows_per_chunk(mut self, rows: u64) -> Self {
        self.rows_per_chunk = rows;
        self
    }

    /// Sets the schema mode.
    #[must_use]
    pub fn with_schema_mode(mut self, mode: SchemaMode) -> Self {
        self.schema_mode = mode;
        self
    }

    /// Sets whether the intermediate is deleted after success.
    #[must_use]
    pub fn with_delete_intermediate(mut self, delete: bool) -> Self {
        self.delete_intermediate = delete;
        self
    }

    /// Sets whether the input archive is deleted after success.
    #[must_use]
    pub fn with_delete_source(mut self, delete: bool) -> Self {
        self.delete_source = delete;
        self
    }

    /// Sets whether chunk names carry the run timestamp.
    #[must_use]
    pub fn with_timestamp_suffix(mut self, enabled: bool) -> Self {
        self.timestamp_suffix = enabled;
        self
    }

    /// Sets the input codec.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the I/O buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the progress checkpoint interval.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Sets the CSV delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Returns the intermediate path, falling back to the default location.
    pub fn resolved_intermediate_path(&self) -> PathBuf {
        self.intermediate_path.clone().unwrap_or_else(|| {
            self.output_dir
                .join(format!("{}.decompressed.jsonl", self.output_base))
        })
    }

    /// Returns the delimiter as the single byte the CSV writer needs.
    ///
    /// Only meaningful after [`validate`](Self::validate) succeeded.
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter).unwrap_or(b',')
    }

    /// Extraction settings derived from this configuration.
    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig::new()
            .with_buffer_size(self.buffer_size)
            .with_progress_interval(self.progress_interval)
    }

    /// Checks that every option is in range.
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            return Err(LogpackError::invalid_config("input", "path is empty"));
        }
        if self.rows_per_chunk == 0 {
            return Err(LogpackError::invalid_config(
                "rows_per_chunk",
                "must be greater than zero",
            ));
        }
        if self.output_base.trim().is_empty() {
            return Err(LogpackError::invalid_config("output_base", "must not be empty"));
        }
        if self.output_base.contains(['/', '\\']) {
            return Err(LogpackError::invalid_config(
                "output_base",
                format!("'{}' must be a file name, not a path", self.output_base),
            ));
        }
        if self.buffer_size == 0 {
            return Err(LogpackError::invalid_config(
                "buffer_size",
                "must be greater than zero",
            ));
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(LogpackError::invalid_config(
                "delimiter",
                format!("{:?} is not a usable single-byte delimiter", self.delimiter),
            ));
        }
        if let SchemaMode::Static(columns) = &self.schema_mode {
            if columns.is_empty() {
                return Err(LogpackError::invalid_config(
                    "schema_mode",
                    "static column list is empty",
                ));
            }
        }
        if same_location(&self.resolved_intermediate_path(), &self.input) {
            return Err(LogpackError::invalid_config(
                "intermediate_path",
                "must differ from the input archive",
            ));
        }
        Ok(())
    }
}

/// Compares two paths after resolving `..`, `.` and symlinks.
fn same_location(a: &Path, b: &Path) -> bool {
    a == b || resolve_path(a) == resolve_path(b)
}

/// Canonical form of `path`. A file that does not exist yet is resolved
/// through its parent directory.
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map_or_else(|_| path.to_path_buf(), |dir| dir.join(name))
        }
        _ => path.to_path_buf(),
    }
}
