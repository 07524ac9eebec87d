//! Streaming record extractor for line-delimited JSON.
//!
//! Each non-blank line is parsed as one JSON object. Lines are read as raw
//! bytes so that a stray invalid UTF-8 sequence only costs that one line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::core::Record;
use crate::error::LogpackError;

use super::{ExtractStats, MalformedLine, RecordIterator, StreamingConfig, StreamingResult};

/// Lazy, single-pass iterator of [`Record`]s over a line-delimited JSON stream.
///
/// # Example
///
/// ```
/// use logpack::streaming::{JsonlRecordIterator, RecordIterator};
///
/// let input = "{\"a\": 1}\n\nnot json\n{\"a\": 2}\n";
/// let mut iter = JsonlRecordIterator::new(input.as_bytes());
///
/// let records: Vec<_> = iter.by_ref().filter_map(Result::ok).collect();
/// assert_eq!(records.len(), 2);
/// assert_eq!(iter.stats().malformed, 1);
/// assert_eq!(iter.stats().empty, 1);
/// ```
pub struct JsonlRecordIterator<R: BufRead> {
    reader: R,
    total_bytes: Option<u64>,
    bytes_read: u64,
    stats: ExtractStats,
    line_buffer: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> JsonlRecordIterator<R> {
    /// Wraps a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            total_bytes: None,
            bytes_read: 0,
            stats: ExtractStats::default(),
            line_buffer: Vec::with_capacity(4096),
            finished: false,
        }
    }

    /// Sets the known stream size, enabling percentage progress.
    #[must_use]
    pub fn with_total_bytes(mut self, total: u64) -> Self {
        self.total_bytes = Some(total);
        self
    }

    /// Parses one physical line. `Ok(None)` means the line was blank.
    fn parse_line(line: &[u8]) -> Result<Option<Record>, serde_json::Error> {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return Ok(None);
        }

        serde_json::from_slice::<Record>(trimmed).map(Some)
    }
}

impl JsonlRecordIterator<BufReader<File>> {
    /// Opens a decompressed file for extraction.
    ///
    /// # Errors
    ///
    /// Returns [`LogpackError::Io`] if the file cannot be opened.
    pub fn open(path: &Path, config: &StreamingConfig) -> Result<Self, LogpackError> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let reader = BufReader::with_capacity(config.buffer_size, file);
        Ok(Self::new(reader).with_total_bytes(file_size))
    }
}

impl<R: BufRead + Send> RecordIterator for JsonlRecordIterator<R> {
    fn stats(&self) -> ExtractStats {
        self.stats
    }

    fn bytes_processed(&self) -> u64 {
        self.bytes_read
    }

    fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }
}

impl<R: BufRead> Iterator for JsonlRecordIterator<R> {
    type Item = StreamingResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.line_buffer.clear();
            match self.reader.read_until(b'\n', &mut self.line_buffer) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(n) => {
                    self.bytes_read += n as u64;
                    self.stats.lines_read += 1;
                    match Self::parse_line(&self.line_buffer) {
                        Ok(Some(record)) => {
                            self.stats.valid += 1;
                            return Some(Ok(record));
                        }
                        Ok(None) => self.stats.empty += 1,
                        Err(source) => {
                            self.stats.malformed += 1;
                            return Some(Err(MalformedLine {
                                line_number: self.stats.lines_read,
                                source,
                            }
                            .into()));
                        }
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
