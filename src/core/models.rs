//! Core data models: records, output chunks and the run manifest.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::Schema;
use crate::error::Result;

/// One decoded input line: an ordered mapping from key to JSON value.
///
/// Key order follows the line itself (serde_json is built with
/// `preserve_order`), which is what dynamic schemas are derived from.
pub type Record = serde_json::Map<String, Value>;

/// Renders a JSON value as a CSV cell.
///
/// Strings are written raw, numbers as their JSON text, booleans as
/// `true`/`false`, null as an empty cell, and nested arrays/objects as
/// compact JSON.
///
/// # Example
///
/// ```
/// use logpack::core::render_value;
/// use serde_json::json;
///
/// assert_eq!(render_value(&json!("GET /")), "GET /");
/// assert_eq!(render_value(&json!(200)), "200");
/// assert_eq!(render_value(&json!(null)), "");
/// assert_eq!(render_value(&json!({"k": [1, 2]})), r#"{"k":[1,2]}"#);
/// ```
pub fn render_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::Bool(true) => Cow::Borrowed("true"),
        Value::Bool(false) => Cow::Borrowed("false"),
        Value::String(s) => Cow::Borrowed(s),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
    }
}

/// One CSV file within a rotated output set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    /// 1-based sequence index
    pub index: usize,
    /// Where the chunk was written
    pub path: PathBuf,
    /// Data rows, excluding the header
    pub rows: u64,
    /// Whether a header line was written (false only for an empty schema)
    pub header_written: bool,
}

/// End-of-run summary of produced chunks and counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Chunks in sequence order
    pub chunks: Vec<OutputChunk>,
    /// Column layout used for every chunk
    pub schema: Schema,
    /// Valid records extracted (equals the sum of chunk rows)
    pub total_records: u64,
    /// Lines skipped because they failed to parse
    pub malformed_lines: u64,
    /// Lines skipped because they were blank
    pub empty_lines: u64,
    /// Size of the decompressed stream
    pub bytes_decompressed: u64,
    /// Timestamp suffix shared by every chunk name, if enabled
    pub timestamp: Option<String>,
    /// Keys seen after the first record that a dynamic schema could not hold
    pub dropped_keys: Vec<String>,
    /// Non-fatal problems, e.g. cleanup failures
    pub warnings: Vec<String>,
}

impl Manifest {
    /// Returns the chunk paths in sequence order.
    pub fn paths(&self) -> Vec<&Path> {
        self.chunks.iter().map(|c| c.path.as_path()).collect()
    }

    /// Returns the number of chunks produced.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the sum of data rows across all chunks.
    pub fn total_rows(&self) -> u64 {
        self.chunks.iter().map(|c| c.rows).sum()
    }

    /// Returns `true` if the run finished without warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Writes the manifest as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(index: usize, rows: u64) -> OutputChunk {
        OutputChunk {
            index,
            path: PathBuf::from(format!("out_{index}.csv")),
            rows,
            header_written: true,
        }
    }

    fn manifest(chunks: Vec<OutputChunk>) -> Manifest {
        let total_records = chunks.iter().map(|c| c.rows).sum();
        Manifest {
            chunks,
            schema: Schema::new(["a", "b"]),
            total_records,
            malformed_lines: 0,
            empty_lines: 0,
            bytes_decompressed: 0,
            timestamp: None,
            dropped_keys: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_render_scalars() {
        assert_eq!(render_value(&json!("x")), "x");
        assert_eq!(render_value(&json!("")), "");
        assert_eq!(render_value(&json!(-7)), "-7");
        assert_eq!(render_value(&json!(0.25)), "0.25");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!(false)), "false");
        assert_eq!(render_value(&Value::Null), "");
    }

    #[test]
    fn test_render_nested_is_compact_json() {
        assert_eq!(render_value(&json!([1, "a", null])), r#"[1,"a",null]"#);
        assert_eq!(render_value(&json!({"b": 1, "a": 2})), r#"{"b":1,"a":2}"#);
    }

    #[test]
    fn test_render_string_is_borrowed() {
        let value = json!("borrowed");
        assert!(matches!(render_value(&value), Cow::Borrowed(_)));
    }

    #[test]
    fn test_manifest_totals() {
        let m = manifest(vec![chunk(1, 2), chunk(2, 1)]);
        assert_eq!(m.chunk_count(), 2);
        assert_eq!(m.total_rows(), 3);
        assert_eq!(m.total_rows(), m.total_records);
        assert_eq!(
            m.paths(),
            vec![Path::new("out_1.csv"), Path::new("out_2.csv")]
        );
        assert!(m.is_clean());
    }

    #[test]
    fn test_manifest_serde_roundtrip() {
        let m = manifest(vec![chunk(1, 5)]);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"total_records\":5"));
        assert!(json.contains("\"schema\":[\"a\",\"b\"]"));

        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn test_manifest_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        manifest(vec![chunk(1, 1)]).write_json(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("out_1.csv"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_manifest_write_json_reports_flush_failure() {
        // The manifest fits in the write buffer, so the error only shows on flush.
        let err = manifest(vec![chunk(1, 1)])
            .write_json(Path::new("/dev/full"))
            .unwrap_err();
        assert!(err.is_io());
    }
}
