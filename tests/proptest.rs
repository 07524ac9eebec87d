//! Property-based tests for logpack.
//!
//! These tests generate random inputs to find edge cases in chunking and
//! record extraction.

use std::fs;

use proptest::prelude::*;

use logpack::core::{ChunkNaming, ChunkedCsvWriter, Record, Schema};
use logpack::streaming::{JsonlRecordIterator, RecordIterator};

/// A line of input: either a well-formed object or something that is not.
#[derive(Debug, Clone)]
enum Line {
    Valid(u32),
    Malformed(&'static str),
    Blank(&'static str),
}

fn arb_line() -> impl Strategy<Value = Line> {
    prop_oneof![
        6 => any::<u32>().prop_map(Line::Valid),
        2 => prop::sample::select(vec!["{", "nope", "42", "[1,2]", "{\"a\":}", "\"str\""])
            .prop_map(Line::Malformed),
        1 => prop::sample::select(vec!["", "   ", "\t", "\r"]).prop_map(Line::Blank),
    ]
}

fn render(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|line| match line {
            Line::Valid(n) => format!("{{\"n\":{n},\"tag\":\"t{n}\"}}\n"),
            Line::Malformed(s) | Line::Blank(s) => format!("{s}\n"),
        })
        .collect()
}

fn record(n: u64) -> Record {
    let mut record = Record::new();
    record.insert("n".into(), n.into());
    record
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ============================================
    // CHUNKING PROPERTIES
    // ============================================

    /// Row counts add up, every chunk but the last is full, and no chunk overflows
    #[test]
    fn chunks_partition_records(total in 0u64..60, rows_per_chunk in 1u64..12) {
        let dir = tempfile::tempdir().unwrap();
        let naming = ChunkNaming::new(dir.path(), "p");
        let mut writer = ChunkedCsvWriter::create(naming, Schema::new(["n"]), rows_per_chunk, b',').unwrap();
        for n in 0..total {
            writer.write_record(&record(n)).unwrap();
        }
        let chunks = writer.finish().unwrap();

        prop_assert_eq!(chunks.iter().map(|c| c.rows).sum::<u64>(), total);

        let expected = total.div_ceil(rows_per_chunk).max(1);
        prop_assert_eq!(chunks.len() as u64, expected);

        let (last, full) = chunks.split_last().unwrap();
        prop_assert!(full.iter().all(|c| c.rows == rows_per_chunk));
        prop_assert!(last.rows <= rows_per_chunk);
        prop_assert!(total == 0 || last.rows > 0);
    }

    /// Every chunk starts with the header exactly once, followed by its own rows in order
    #[test]
    fn every_chunk_has_one_header(total in 1u64..40, rows_per_chunk in 1u64..8) {
        let dir = tempfile::tempdir().unwrap();
        let naming = ChunkNaming::new(dir.path(), "h");
        let mut writer = ChunkedCsvWriter::create(naming, Schema::new(["n", "n"]), rows_per_chunk, b',').unwrap();
        for n in 0..total {
            writer.write_record(&record(n)).unwrap();
        }

        let mut next = 0u64;
        for (i, chunk) in writer.finish().unwrap().iter().enumerate() {
            prop_assert_eq!(chunk.index, i + 1);
            let content = fs::read_to_string(&chunk.path).unwrap();
            let mut lines = content.lines();
            prop_assert_eq!(lines.next(), Some("n,n"));
            for line in lines {
                prop_assert_eq!(line, format!("{next},{next}"));
                next += 1;
            }
        }
        prop_assert_eq!(next, total);
    }

    // ============================================
    // EXTRACTION PROPERTIES
    // ============================================

    /// K valid and M malformed lines always yield K records and M malformed events
    #[test]
    fn extraction_counts_match(lines in prop::collection::vec(arb_line(), 0..80)) {
        let valid = lines.iter().filter(|l| matches!(l, Line::Valid(_))).count() as u64;
        let malformed = lines.iter().filter(|l| matches!(l, Line::Malformed(_))).count() as u64;
        let blank = lines.iter().filter(|l| matches!(l, Line::Blank(_))).count() as u64;

        let input = render(&lines);
        let mut records = JsonlRecordIterator::new(input.as_bytes());
        let (ok, errors): (Vec<_>, Vec<_>) = records.by_ref().partition(Result::is_ok);

        prop_assert_eq!(ok.len() as u64, valid);
        prop_assert_eq!(errors.len() as u64, malformed);
        prop_assert!(errors.iter().all(|e| e.as_ref().unwrap_err().is_recoverable()));

        let stats = records.stats();
        prop_assert_eq!(stats.valid, valid);
        prop_assert_eq!(stats.malformed, malformed);
        prop_assert_eq!(stats.empty, blank);
        prop_assert_eq!(stats.lines_read, lines.len() as u64);
    }

    /// Valid records come out in input order
    #[test]
    fn extraction_preserves_order(values in prop::collection::vec(any::<u32>(), 0..50)) {
        let lines: Vec<_> = values.iter().copied().map(Line::Valid).collect();
        let input = render(&lines);
        let seen: Vec<u64> = JsonlRecordIterator::new(input.as_bytes())
            .map(|r| r.unwrap()["n"].as_u64().unwrap())
            .collect();
        let expected: Vec<u64> = values.iter().map(|&v| u64::from(v)).collect();
        prop_assert_eq!(seen, expected);
    }

    /// Arbitrary bytes never panic the extractor and never produce fatal errors
    #[test]
    fn extraction_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut records = JsonlRecordIterator::new(bytes.as_slice());
        for item in records.by_ref() {
            if let Err(e) = item {
                prop_assert!(e.is_recoverable());
            }
        }
        let stats = records.stats();
        prop_assert_eq!(stats.lines_read, stats.valid + stats.malformed + stats.empty);
    }
}
