//! The conversion pipeline: decompress, extract, resolve schema, write chunks, clean up.
//!
//! Stages run strictly in sequence on one thread. Records are pulled one at a
//! time from the decompressed stream and pushed straight into the chunk
//! writer, so memory use does not grow with the input.
//!
//! # Failure handling
//!
//! - Malformed lines are logged, counted and skipped.
//! - A fatal error aborts the remaining stages and returns a
//!   [`PipelineError`] naming the [`Stage`] and the [`PartialProgress`]. Closed
//!   chunks and the intermediate artifact are left on disk.
//! - Cleanup failures become warnings on the [`Manifest`].
//!
//! # Example
//!
//! ```rust,no_run
//! use logpack::config::PipelineConfig;
//! use logpack::pipeline::Pipeline;
//!
//! let config = PipelineConfig::new("Test_Log.zst", "exports").with_rows_per_chunk(500_000);
//!
//! match Pipeline::new(config).run() {
//!     Ok(manifest) => {
//!         for chunk in &manifest.chunks {
//!             println!("{} ({} rows)", chunk.path.display(), chunk.rows);
//!         }
//!     }
//!     Err(e) => eprintln!("{} stage failed: {}", e.stage, e.source),
//! }
//! ```

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{
    ChunkNaming, ChunkedCsvWriter, KeyAudit, Manifest, OutputChunk, Record, Schema,
    SchemaResolver,
};
use crate::decompress::Decompressor;
use crate::error::{LogpackError, PartialProgress, PipelineError, Stage};
use crate::progress::{Progress, ProgressCallback, log_progress};
use crate::streaming::{
    ExtractStats, JsonlRecordIterator, RecordIterator, StreamingConfig, StreamingError,
};

/// Chunk-name timestamp format (local time), fixed once per run.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Runs one archive through the full conversion.
pub struct Pipeline {
    config: PipelineConfig,
    progress: ProgressCallback,
    cancel: CancellationToken,
}

/// What the extract/write stages produced.
struct Conversion {
    schema: Schema,
    chunks: Vec<OutputChunk>,
    stats: ExtractStats,
    dropped_keys: Vec<String>,
}

impl Pipeline {
    /// Creates a pipeline that logs progress checkpoints.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            progress: log_progress(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = callback;
        self
    }

    /// Uses `token` to stop the run between records.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Executes every stage and returns the manifest.
    pub fn run(&self) -> Result<Manifest, PipelineError> {
        let config = &self.config;
        let validate = |e: LogpackError| PipelineError::new(Stage::Validate, PartialProgress::default(), e);

        config.validate().map_err(validate)?;
        let input_size = Self::input_size(&config.input).map_err(validate)?;
        info!(
            input = %config.input.display(),
            bytes = input_size,
            rows_per_chunk = config.rows_per_chunk,
            "starting conversion"
        );

        let intermediate = config.resolved_intermediate_path();
        let bytes_decompressed = self.decompress(&intermediate)?;

        let timestamp = config
            .timestamp_suffix
            .then(|| Local::now().format(TIMESTAMP_FORMAT).to_string());
        let mut naming = ChunkNaming::new(&config.output_dir, &config.output_base);
        if let Some(ts) = &timestamp {
            naming = naming.with_timestamp(ts);
        }

        let conversion = self.convert(&intermediate, naming)?;

        let mut warnings = Vec::new();
        if config.delete_intermediate {
            Self::remove_artifact("intermediate", &intermediate, &mut warnings);
        }
        if config.delete_source {
            Self::remove_artifact("source", &config.input, &mut warnings);
        }

        let manifest = Manifest {
            total_records: conversion.stats.valid,
            malformed_lines: conversion.stats.malformed,
            empty_lines: conversion.stats.empty,
            chunks: conversion.chunks,
            schema: conversion.schema,
            bytes_decompressed,
            timestamp,
            dropped_keys: conversion.dropped_keys,
            warnings,
        };

        info!(
            chunks = manifest.chunk_count(),
            rows = manifest.total_records,
            malformed = manifest.malformed_lines,
            warnings = manifest.warnings.len(),
            "conversion complete"
        );
        Ok(manifest)
    }

    fn input_size(input: &Path) -> Result<u64, LogpackError> {
        match fs::metadata(input) {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(LogpackError::invalid_config(
                "input",
                format!("{} is not a file", input.display()),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(LogpackError::InputNotFound {
                path: input.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn decompress(&self, intermediate: &Path) -> Result<u64, PipelineError> {
        let config = &self.config;
        let fail = |e: LogpackError| PipelineError::new(Stage::Decompress, PartialProgress::default(), e);

        if let Some(parent) = intermediate.parent() {
            fs::create_dir_all(parent).map_err(|e| fail(e.into()))?;
        }

        let bytes = Decompressor::new(config.compression)
            .with_buffer_size(config.buffer_size)
            .with_source_path(&config.input)
            .with_cancellation(self.cancel.clone())
            .decompress_file(&config.input, intermediate)
            .map_err(fail)?;

        info!(
            bytes,
            path = %intermediate.display(),
            "decompression complete"
        );
        Ok(bytes)
    }

    fn convert(&self, intermediate: &Path, naming: ChunkNaming) -> Result<Conversion, PipelineError> {
        let config = &self.config;
        let streaming = config.streaming_config();

        let mut extraction = Extraction::open(intermediate, &streaming, &self.progress, &self.cancel)
            .map_err(|e| PipelineError::new(Stage::Extract, PartialProgress::default(), e))?;

        let resolver = SchemaResolver::new(config.schema_mode.clone());
        let first = if resolver.needs_first_record() {
            extraction.pull(None).map_err(|e| {
                PipelineError::new(Stage::Extract, extraction.partial_progress(), e)
            })?
        } else {
            None
        };

        let schema = resolver.resolve(first.as_ref());
        let mut audit = resolver.needs_first_record().then(|| KeyAudit::new(&schema));

        let mut writer = ChunkedCsvWriter::create(
            naming,
            schema,
            config.rows_per_chunk,
            config.delimiter_byte(),
        )
        .map_err(|e| PipelineError::new(Stage::Write, extraction.partial_progress(), e))?;

        let mut pending = first;
        loop {
            let record = match pending.take() {
                Some(record) => record,
                None => match extraction.pull(Some(&writer)) {
                    Ok(Some(record)) => {
                        if let Some(audit) = audit.as_mut() {
                            audit.observe(&record, extraction.stats().lines_read);
                        }
                        record
                    }
                    Ok(None) => break,
                    Err(e) => return Err(abort(Stage::Extract, writer, extraction.stats(), e)),
                },
            };

            if let Err(e) = writer.write_record(&record) {
                return Err(abort(Stage::Write, writer, extraction.stats(), e));
            }
        }

        let stats = extraction.stats();
        let schema = writer.schema().clone();
        let partial = progress_of(&writer, stats);
        let chunks = writer
            .finish()
            .map_err(|e| PipelineError::new(Stage::Write, partial, e))?;

        debug_assert_eq!(chunks.iter().map(|c| c.rows).sum::<u64>(), stats.valid);

        Ok(Conversion {
            schema,
            chunks,
            stats,
            dropped_keys: audit.map(KeyAudit::into_dropped).unwrap_or_default(),
        })
    }

    fn remove_artifact(artifact: &'static str, path: &Path, warnings: &mut Vec<String>) {
        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(artifact, path = %path.display(), "nothing to remove");
                return;
            }
            Err(_) => 0,
        };

        match fs::remove_file(path) {
            Ok(()) => info!(artifact, path = %path.display(), freed_bytes = size, "removed artifact"),
            Err(e) => {
                let err = LogpackError::cleanup(artifact, path, e);
                warn!(error = %err, "cleanup failed; output is unaffected");
                warnings.push(err.to_string());
            }
        }
    }
}

/// Pulls records from the intermediate artifact, handling malformed lines,
/// cancellation and progress checkpoints.
struct Extraction<'a> {
    records: JsonlRecordIterator<BufReader<File>>,
    progress: &'a ProgressCallback,
    cancel: &'a CancellationToken,
    interval: u64,
    next_checkpoint: u64,
}

impl<'a> Extraction<'a> {
    fn open(
        path: &Path,
        streaming: &StreamingConfig,
        progress: &'a ProgressCallback,
        cancel: &'a CancellationToken,
    ) -> Result<Self, LogpackError> {
        let interval = streaming.progress_interval as u64;
        Ok(Self {
            records: JsonlRecordIterator::open(path, streaming)?,
            progress,
            cancel,
            interval,
            next_checkpoint: interval,
        })
    }

    fn stats(&self) -> ExtractStats {
        self.records.stats()
    }

    fn partial_progress(&self) -> PartialProgress {
        PartialProgress {
            malformed_lines: self.stats().malformed,
            ..PartialProgress::default()
        }
    }

    /// Returns the next valid record, `None` at end of input.
    fn pull(&mut self, writer: Option<&ChunkedCsvWriter>) -> Result<Option<Record>, LogpackError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(LogpackError::Cancelled);
            }

            let item = self.records.next();
            self.checkpoint(writer);

            match item {
                None => return Ok(None),
                Some(Ok(record)) => return Ok(Some(record)),
                Some(Err(StreamingError::Malformed(line))) => {
                    warn!(
                        line = line.line_number,
                        error = %line.source,
                        "skipping malformed line"
                    );
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    fn checkpoint(&mut self, writer: Option<&ChunkedCsvWriter>) {
        if self.interval == 0 {
            return;
        }
        let stats = self.records.stats();
        if stats.lines_read < self.next_checkpoint {
            return;
        }
        self.next_checkpoint = (stats.lines_read / self.interval + 1) * self.interval;

        (self.progress)(Progress {
            lines_read: stats.lines_read,
            bytes_processed: self.records.bytes_processed(),
            total_bytes: self.records.total_bytes(),
            records_written: writer.map_or(0, ChunkedCsvWriter::rows_written),
            malformed_lines: stats.malformed,
            current_chunk: writer.map_or(1, |w| w.state().chunk_index()),
        });
    }
}

fn progress_of(writer: &ChunkedCsvWriter, stats: ExtractStats) -> PartialProgress {
    PartialProgress {
        chunks_completed: chunk_paths(writer.completed_chunks()),
        rows_written: writer.rows_written(),
        malformed_lines: stats.malformed,
    }
}

fn chunk_paths(chunks: &[OutputChunk]) -> Vec<PathBuf> {
    chunks.iter().map(|c| c.path.clone()).collect()
}

/// Stops the writer after a fatal error or cancellation.
///
/// On cancellation the open chunk is closed cleanly and counts as completed.
/// On other errors it is left as-is (flushed on drop) and not reported as completed.
fn abort(
    stage: Stage,
    writer: ChunkedCsvWriter,
    stats: ExtractStats,
    source: LogpackError,
) -> PipelineError {
    let mut progress = progress_of(&writer, stats);

    if source.is_cancelled() {
        match writer.finish() {
            Ok(chunks) => progress.chunks_completed = chunk_paths(&chunks),
            Err(e) => warn!(error = %e, "failed to close chunk after cancellation"),
        }
        info!(
            chunks = progress.chunks_completed.len(),
            rows = progress.rows_written,
            "conversion cancelled"
        );
    } else {
        drop(writer);
    }

    PipelineError::new(stage, progress, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaMode;
    use std::sync::{Arc, Mutex};
    use tempfile::{TempDir, tempdir};

    fn archive(dir: &TempDir, lines: &[&str]) -> PathBuf {
        let mut payload = lines.join("\n");
        payload.push('\n');
        let path = dir.path().join("input.zst");
        fs::write(&path, zstd::encode_all(payload.as_bytes(), 3).unwrap()).unwrap();
        path
    }

    fn config(dir: &TempDir, input: PathBuf) -> PipelineConfig {
        PipelineConfig::new(input, dir.path().join("out")).with_output_base("t")
    }

    #[test]
    fn test_run_basic() {
        let dir = tempdir().unwrap();
        let input = archive(&dir, &[r#"{"a":1,"b":2}"#, r#"{"a":3,"b":4}"#, r#"{"a":5,"b":6}"#]);

        let manifest = Pipeline::new(config(&dir, input).with_rows_per_chunk(2))
            .run()
            .unwrap();

        assert_eq!(manifest.chunk_count(), 2);
        assert_eq!(manifest.total_records, 3);
        assert_eq!(manifest.total_rows(), 3);
        assert_eq!(manifest.schema.columns(), ["a", "b"]);
        assert!(manifest.is_clean());
    }

    #[test]
    fn test_missing_input_fails_validation() {
        let dir = tempdir().unwrap();
        let err = Pipeline::new(config(&dir, dir.path().join("nope.zst")))
            .run()
            .unwrap_err();
        assert_eq!(err.stage, Stage::Validate);
        assert!(matches!(err.source, LogpackError::InputNotFound { .. }));
    }

    #[test]
    fn test_directory_input_fails_validation() {
        let dir = tempdir().unwrap();
        let err = Pipeline::new(config(&dir, dir.path().to_path_buf()))
            .run()
            .unwrap_err();
        assert_eq!(err.stage, Stage::Validate);
        assert!(err.source.is_invalid_config());
    }

    #[test]
    fn test_corrupt_input_fails_in_decompress_stage() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("bad.zst");
        let mut bytes = crate::decompress::ZSTD_MAGIC.to_vec();
        bytes.extend_from_slice(&[0xAB; 32]);
        fs::write(&input, bytes).unwrap();

        let err = Pipeline::new(config(&dir, input)).run().unwrap_err();
        assert_eq!(err.stage, Stage::Decompress);
        assert!(err.source.is_decompression());
        assert!(err.progress.chunks_completed.is_empty());
    }

    #[test]
    fn test_progress_checkpoints() {
        let dir = tempdir().unwrap();
        let lines: Vec<String> = (0..25).map(|i| format!(r#"{{"n":{i}}}"#)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = archive(&dir, &refs);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |p| sink.lock().unwrap().push(p));

        Pipeline::new(config(&dir, input).with_progress_interval(10))
            .with_progress(callback)
            .run()
            .unwrap();

        let seen = seen.lock().unwrap();
        let lines_at: Vec<u64> = seen.iter().map(|p| p.lines_read).collect();
        assert_eq!(lines_at, [10, 20]);
        assert_eq!(seen[1].records_written, 19);
    }

    #[test]
    fn test_cancellation_closes_open_chunk() {
        let dir = tempdir().unwrap();
        let lines: Vec<String> = (0..50).map(|i| format!(r#"{{"n":{i}}}"#)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = archive(&dir, &refs);

        let token = CancellationToken::new();
        let trigger = token.clone();
        let callback: ProgressCallback = Arc::new(move |p| {
            if p.lines_read >= 15 {
                trigger.cancel();
            }
        });

        let err = Pipeline::new(
            config(&dir, input)
                .with_rows_per_chunk(10)
                .with_progress_interval(15),
        )
        .with_progress(callback)
        .with_cancellation(token)
        .run()
        .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.stage, Stage::Extract);
        // The record whose line triggered the checkpoint is still written.
        assert_eq!(err.progress.rows_written, 15);
        assert_eq!(err.progress.chunks_completed.len(), 2);

        let second = fs::read_to_string(&err.progress.chunks_completed[1]).unwrap();
        assert_eq!(second.lines().count(), 1 + 5);
    }

    #[test]
    fn test_dropped_keys_reported_for_dynamic_schema() {
        let dir = tempdir().unwrap();
        let input = archive(&dir, &[r#"{"a":1}"#, r#"{"a":2,"late":true}"#]);

        let manifest = Pipeline::new(config(&dir, input)).run().unwrap();
        assert_eq!(manifest.dropped_keys, ["late"]);
    }

    #[test]
    fn test_static_schema_reports_no_dropped_keys() {
        let dir = tempdir().unwrap();
        let input = archive(&dir, &[r#"{"a":1,"b":2}"#]);

        let manifest = Pipeline::new(
            config(&dir, input).with_schema_mode(SchemaMode::fixed(["a"])),
        )
        .run()
        .unwrap();
        assert!(manifest.dropped_keys.is_empty());
    }

    #[test]
    fn test_timestamp_suffix_shared_by_all_chunks() {
        let dir = tempdir().unwrap();
        let input = archive(&dir, &[r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#]);

        let manifest = Pipeline::new(
            config(&dir, input)
                .with_rows_per_chunk(1)
                .with_timestamp_suffix(true),
        )
        .run()
        .unwrap();

        let ts = manifest.timestamp.clone().unwrap();
        assert_eq!(ts.len(), "2024-01-01_00-00-00".len());
        for chunk in &manifest.chunks {
            let name = chunk.path.file_name().unwrap().to_str().unwrap();
            assert_eq!(name, format!("t_{}_{}.csv", chunk.index, ts));
        }
    }

    #[test]
    fn test_remove_artifact_missing_is_silent() {
        let dir = tempdir().unwrap();
        let mut warnings = Vec::new();
        Pipeline::remove_artifact("intermediate", &dir.path().join("gone"), &mut warnings);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_remove_artifact_failure_becomes_warning() {
        let dir = tempdir().unwrap();
        let mut warnings = Vec::new();
        // A non-empty directory cannot be removed with remove_file.
        let target = dir.path().join("stage");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), b"x").unwrap();

        Pipeline::remove_artifact("intermediate", &target, &mut warnings);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("intermediate"));
        assert!(target.exists());
    }
}
