//! Streaming decompression of the input archive.
//!
//! The whole source is decoded through a fixed-size transfer buffer, so memory
//! stays bounded no matter how large the archive or its payload is.
//!
//! # Example
//!
//! ```rust,no_run
//! use logpack::decompress::{Compression, Decompressor};
//!
//! let bytes = Decompressor::new(Compression::Auto)
//!     .decompress_file("logs.zst".as_ref(), "logs.jsonl".as_ref())?;
//! println!("{bytes} bytes decompressed");
//! # Ok::<(), logpack::LogpackError>(())
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::{LogpackError, Result};

/// Zstandard frame magic number.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Gzip member magic number.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Default transfer buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Input compression format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Sniff the magic bytes; plain input passes through.
    #[default]
    Auto,
    /// Zstandard
    Zstd,
    /// Gzip (multi-member)
    Gzip,
    /// Already decompressed
    None,
}

impl Compression {
    /// Human-readable name of this codec (for logging).
    pub fn name(&self) -> &'static str {
        match self {
            Compression::Auto => "auto",
            Compression::Zstd => "zstd",
            Compression::Gzip => "gzip",
            Compression::None => "none",
        }
    }

    /// Detects the codec from the first bytes of a stream.
    ///
    /// ```
    /// use logpack::decompress::Compression;
    ///
    /// assert_eq!(Compression::detect(&[0x28, 0xB5, 0x2F, 0xFD, 0x00]), Compression::Zstd);
    /// assert_eq!(Compression::detect(&[0x1F, 0x8B, 0x08]), Compression::Gzip);
    /// assert_eq!(Compression::detect(b"{\"a\":1}"), Compression::None);
    /// ```
    pub fn detect(header: &[u8]) -> Compression {
        if header.starts_with(&ZSTD_MAGIC) {
            Compression::Zstd
        } else if header.starts_with(&GZIP_MAGIC) {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    /// Returns all supported names (including aliases).
    pub fn all_names() -> &'static [&'static str] {
        &["auto", "zstd", "zst", "gzip", "gz", "none", "plain"]
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Compression::Auto),
            "zstd" | "zst" => Ok(Compression::Zstd),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "none" | "plain" => Ok(Compression::None),
            _ => Err(format!(
                "Unknown compression: '{}'. Expected one of: {}",
                s,
                Compression::all_names().join(", ")
            )),
        }
    }
}

/// Streams a compressed source into a plain sink.
#[derive(Debug, Clone)]
pub struct Decompressor {
    compression: Compression,
    buffer_size: usize,
    source_path: Option<PathBuf>,
    cancel: Option<CancellationToken>,
}

impl Decompressor {
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            buffer_size: DEFAULT_BUFFER_SIZE,
            source_path: None,
            cancel: None,
        }
    }

    /// Sets the transfer buffer size (bytes held in memory at once).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Names the source in error messages.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Checks `token` between transfer buffers.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn error(&self, codec: Compression, source: io::Error) -> LogpackError {
        LogpackError::decompression(codec.name(), self.source_path.clone(), source)
    }

    /// Decompresses all of `source` into `sink`.
    ///
    /// Returns the number of decompressed bytes written.
    ///
    /// # Errors
    ///
    /// - [`LogpackError::Decompression`] if the source is corrupt or truncated
    /// - [`LogpackError::Io`] if the sink cannot be written
    /// - [`LogpackError::UnsupportedCompression`] if the codec is compiled out
    /// - [`LogpackError::Cancelled`] if cancellation was requested
    pub fn decompress<R: Read, W: Write>(&self, source: R, mut sink: W) -> Result<u64> {
        let mut source = BufReader::with_capacity(self.buffer_size, source);

        let codec = match self.compression {
            Compression::Auto => {
                let header = source
                    .fill_buf()
                    .map_err(|e| self.error(Compression::Auto, e))?;
                Compression::detect(header)
            }
            explicit => explicit,
        };
        debug!(codec = codec.name(), "decompressing input");

        let mut decoder = self.open_decoder(codec, source)?;
        let mut buffer = vec![0u8; self.buffer_size];
        let mut total = 0u64;

        loop {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(LogpackError::Cancelled);
            }

            let n = match decoder.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.error(codec, e)),
            };
            sink.write_all(&buffer[..n])?;
            total += n as u64;
        }

        sink.flush()?;
        Ok(total)
    }

    /// Decompresses the file at `input` into a new file at `output`.
    pub fn decompress_file(&self, input: &Path, output: &Path) -> Result<u64> {
        let source = File::open(input)?;
        let sink = BufWriter::with_capacity(self.buffer_size, File::create(output)?);
        self.decompress(source, sink)
    }

    fn open_decoder<'a, R: BufRead + 'a>(
        &self,
        codec: Compression,
        source: R,
    ) -> Result<Box<dyn Read + 'a>> {
        match codec {
            Compression::Zstd => self.zstd_decoder(source),
            Compression::Gzip => self.gzip_decoder(source),
            Compression::None | Compression::Auto => Ok(Box::new(source)),
        }
    }

    #[cfg(feature = "zstd")]
    fn zstd_decoder<'a, R: BufRead + 'a>(&self, source: R) -> Result<Box<dyn Read + 'a>> {
        let decoder = zstd::stream::read::Decoder::with_buffer(source)
            .map_err(|e| self.error(Compression::Zstd, e))?;
        Ok(Box::new(decoder))
    }

    #[cfg(not(feature = "zstd"))]
    fn zstd_decoder<'a, R: BufRead + 'a>(&self, _source: R) -> Result<Box<dyn Read + 'a>> {
        Err(LogpackError::UnsupportedCompression { codec: "zstd" })
    }

    #[cfg(feature = "gzip")]
    fn gzip_decoder<'a, R: BufRead + 'a>(&self, source: R) -> Result<Box<dyn Read + 'a>> {
        Ok(Box::new(flate2::bufread::MultiGzDecoder::new(source)))
    }

    #[cfg(not(feature = "gzip"))]
    fn gzip_decoder<'a, R: BufRead + 'a>(&self, _source: R) -> Result<Box<dyn Read + 'a>> {
        Err(LogpackError::UnsupportedCompression { codec: "gzip" })
    }
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new(Compression::Auto)
    }
}
