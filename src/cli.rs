//! Command-line interface definition using clap.
//!
//! This module defines [`Args`] and how it folds into a [`PipelineConfig`].
//! Values from `--config` are loaded first; flags given on the command line
//! override them.
//!
//! ```rust
//! use clap::Parser;
//! use logpack::cli::Args;
//!
//! let args = Args::parse_from(["logpack", "Test_Log.zst", "-o", "exports", "--spreadsheet"]);
//! let config = args.to_config()?;
//! assert_eq!(config.rows_per_chunk, 1_048_575);
//! # Ok::<(), logpack::LogpackError>(())
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::config::{PipelineConfig, SPREADSHEET_ROWS_PER_CHUNK};
use crate::core::SchemaMode;
use crate::decompress::Compression;
use crate::error::{LogpackError, Result};

/// Convert compressed NDJSON log archives into row-limited CSV chunks.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "logpack")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    logpack Test_Log.zst -o exports
    logpack Test_Log.zst --cloudflare --spreadsheet --timestamp -b Exported_data_part
    logpack logs.jsonl.gz -c timestamp,host,status -n 500000
    logpack --config run.json --manifest manifest.json")]
pub struct Args {
    /// Path to the compressed input archive
    pub input: Option<PathBuf>,

    /// Directory for the CSV chunks
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Chunk file name prefix
    #[arg(short, long, value_name = "NAME")]
    pub base: Option<String>,

    /// Maximum data rows per chunk
    #[arg(short = 'n', long, value_name = "ROWS", conflicts_with = "spreadsheet")]
    pub rows_per_chunk: Option<u64>,

    /// Keep every chunk within a spreadsheet's row limit (1,048,575 rows)
    #[arg(long)]
    pub spreadsheet: bool,

    /// Comma-separated output columns (default: keys of the first record)
    #[arg(
        short,
        long,
        value_name = "COLS",
        value_delimiter = ',',
        conflicts_with = "cloudflare"
    )]
    pub columns: Option<Vec<String>>,

    /// Use the Cloudflare log export column preset
    #[arg(long)]
    pub cloudflare: bool,

    /// Keep the decompressed intermediate file
    #[arg(long)]
    pub keep_intermediate: bool,

    /// Delete the input archive after a successful run
    #[arg(long)]
    pub delete_source: bool,

    /// Append the run timestamp to chunk names
    #[arg(short = 't', long)]
    pub timestamp: bool,

    /// Input compression: auto, zstd, gzip or none
    #[arg(long, value_name = "CODEC")]
    pub compression: Option<Compression>,

    /// Where to stage the decompressed stream
    #[arg(long, value_name = "PATH")]
    pub intermediate: Option<PathBuf>,

    /// CSV field delimiter
    #[arg(short, long, value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Load settings from a JSON file (flags override it)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the run manifest as JSON to this path
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,
}

impl Args {
    /// Builds the pipeline configuration these arguments describe.
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(input) = &self.input {
            config.input.clone_from(input);
        }
        if config.input.as_os_str().is_empty() {
            return Err(LogpackError::invalid_config(
                "input",
                "no input archive given (pass a path or set \"input\" in --config)",
            ));
        }

        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(base) = &self.base {
            config.output_base.clone_from(base);
        }
        if self.spreadsheet {
            config.rows_per_chunk = SPREADSHEET_ROWS_PER_CHUNK;
        } else if let Some(rows) = self.rows_per_chunk {
            config.rows_per_chunk = rows;
        }

        if self.cloudflare {
            config.schema_mode = SchemaMode::cloudflare();
        } else if let Some(columns) = &self.columns {
            config.schema_mode = SchemaMode::fixed(
                columns
                    .iter()
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty()),
            );
        }

        if self.keep_intermediate {
            config.delete_intermediate = false;
        }
        if self.delete_source {
            config.delete_source = true;
        }
        if self.timestamp {
            config.timestamp_suffix = true;
        }
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
        if let Some(path) = &self.intermediate {
            config.intermediate_path = Some(path.clone());
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ROWS_PER_CHUNK;
    use crate::core::CLOUDFLARE_LOG_COLUMNS;
    use std::fs;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("logpack").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["in.zst"]).to_config().unwrap();
        assert_eq!(config.input, PathBuf::from("in.zst"));
        assert_eq!(config.rows_per_chunk, DEFAULT_ROWS_PER_CHUNK);
        assert!(config.schema_mode.is_dynamic());
        assert!(config.delete_intermediate);
        assert!(!config.delete_source);
        assert!(!config.timestamp_suffix);
    }

    #[test]
    fn test_columns_become_static_schema() {
        let config = parse(&["in.zst", "-c", "a, b,,c"]).to_config().unwrap();
        assert_eq!(config.schema_mode, SchemaMode::fixed(["a", "b", "c"]));
    }

    #[test]
    fn test_cloudflare_preset() {
        let config = parse(&["in.zst", "--cloudflare"]).to_config().unwrap();
        assert_eq!(config.schema_mode, SchemaMode::fixed(CLOUDFLARE_LOG_COLUMNS.iter().copied()));
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        assert!(Args::try_parse_from(["logpack", "in.zst", "-n", "5", "--spreadsheet"]).is_err());
        assert!(Args::try_parse_from(["logpack", "in.zst", "-c", "a", "--cloudflare"]).is_err());
    }

    #[test]
    fn test_flags() {
        let config = parse(&[
            "in.zst",
            "-o",
            "out",
            "-b",
            "part",
            "-n",
            "10",
            "--keep-intermediate",
            "--delete-source",
            "--timestamp",
            "--compression",
            "gz",
            "--intermediate",
            "stage.jsonl",
            "-d",
            ";",
        ])
        .to_config()
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.output_base, "part");
        assert_eq!(config.rows_per_chunk, 10);
        assert!(!config.delete_intermediate);
        assert!(config.delete_source);
        assert!(config.timestamp_suffix);
        assert_eq!(config.compression, Compression::Gzip);
        assert_eq!(config.intermediate_path, Some(PathBuf::from("stage.jsonl")));
        assert_eq!(config.delimiter, ';');
    }

    #[test]
    fn test_unknown_compression_rejected() {
        assert!(Args::try_parse_from(["logpack", "in.zst", "--compression", "lz4"]).is_err());
    }

    #[test]
    fn test_missing_input() {
        let err = parse(&[]).to_config().unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    fn test_zero_rows_rejected() {
        let err = parse(&["in.zst", "-n", "0"]).to_config().unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    fn test_config_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(
            &path,
            r#"{"input": "from_file.zst", "rows_per_chunk": 7, "output_base": "cfg"}"#,
        )
        .unwrap();

        let config = parse(&["--config", path.to_str().unwrap(), "-n", "9"])
            .to_config()
            .unwrap();
        assert_eq!(config.input, PathBuf::from("from_file.zst"));
        assert_eq!(config.output_base, "cfg");
        assert_eq!(config.rows_per_chunk, 9);
    }
}
