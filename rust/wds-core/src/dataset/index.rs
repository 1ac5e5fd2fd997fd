// rust/wds-core/src/dataset/index.rs

//! Parser for the line-oriented archive index format.
//!
//! ```text
//! v1.0 2
//! jpg 512 2048 txt 2560 16
//! jpg 5120 1024
//! ```
//!
//! The first line carries the format version and the number of samples.
//! Every following line describes one sample as a sequence of
//! `<extension> <offset> <size>` triples. Offsets are absolute positions in
//! the paired archive and must be aligned to [`BLOCK_SIZE`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Result, WdsError};

use super::types::{IndexComponent, IndexSample, BLOCK_SIZE, INDEX_VERSION};

/// Parses the index file at `index_path`, appending to the given tables.
///
/// # Errors
///
/// Returns a `Storage` error if the file cannot be opened or read and
/// `MalformedIndex` if its content is invalid.
pub fn parse_index_file(
    index_path: &Path,
    samples: &mut Vec<IndexSample>,
    components: &mut Vec<IndexComponent>,
) -> Result<()> {
    let file = File::open(index_path).map_err(|e| {
        WdsError::storage_with_source(index_path, "failed to open index file", e)
    })?;
    parse_index(BufReader::new(file), index_path, samples, components)
}

/// Parses one index from `reader`, appending samples and components.
///
/// Parsing is additive so several index files can share one pair of tables.
/// On error the tables are truncated back to their lengths at entry.
///
/// # Errors
///
/// Returns `MalformedIndex` naming `index_path` and the offending line
/// (0 for the header).
pub fn parse_index<R: BufRead>(
    reader: R,
    index_path: &Path,
    samples: &mut Vec<IndexSample>,
    components: &mut Vec<IndexComponent>,
) -> Result<()> {
    let samples_len = samples.len();
    let components_len = components.len();

    let result = parse_into(reader, index_path, samples, components);
    if result.is_err() {
        samples.truncate(samples_len);
        components.truncate(components_len);
    }
    result
}

fn parse_into<R: BufRead>(
    reader: R,
    index_path: &Path,
    samples: &mut Vec<IndexSample>,
    components: &mut Vec<IndexComponent>,
) -> Result<()> {
    let mut lines = reader.lines();
    let mut next_line = || -> Result<String> {
        lines
            .next()
            .transpose()
            .map(Option::unwrap_or_default)
            .map_err(|e| WdsError::storage_with_source(index_path, "failed to read index file", e))
    };

    let header = next_line()?;
    let sample_count = parse_header(&header, index_path)?;

    // The declared count is untrusted; grow with the lines actually present.
    for line_number in 1..=sample_count {
        let line = next_line()?;
        let start = components.len();
        parse_sample_line(&line, index_path, line_number, components)?;

        if components.len() == start {
            return Err(WdsError::malformed_index(
                index_path,
                line_number,
                "no extensions provided for the sample",
            ));
        }

        samples.push(IndexSample {
            components: start..components.len(),
            line_number,
        });
    }

    Ok(())
}

/// Validates the header line and returns the declared sample count.
fn parse_header(header: &str, index_path: &Path) -> Result<usize> {
    let mut tokens = header.split_whitespace();

    let version = tokens
        .next()
        .ok_or_else(|| WdsError::malformed_index(index_path, 0, "no version signature found"))?;
    if version != INDEX_VERSION {
        return Err(WdsError::malformed_index(
            index_path,
            0,
            format!(
                "the version of the index file does not match the expected version (expected: {INDEX_VERSION} actual: {version})"
            ),
        ));
    }

    let count: i64 = tokens
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| WdsError::malformed_index(index_path, 0, "no sample count found"))?;
    if count <= 0 {
        return Err(WdsError::malformed_index(
            index_path,
            0,
            "sample count must be positive",
        ));
    }

    usize::try_from(count)
        .map_err(|_| WdsError::malformed_index(index_path, 0, "sample count is too large"))
}

fn parse_sample_line(
    line: &str,
    index_path: &Path,
    line_number: usize,
    components: &mut Vec<IndexComponent>,
) -> Result<()> {
    let mut tokens = line.split_whitespace();

    while let Some(ext) = tokens.next() {
        let offset = tokens.next().and_then(|t| t.parse::<u64>().ok());
        let size = tokens.next().and_then(|t| t.parse::<u64>().ok());
        let (Some(offset), Some(size)) = (offset, size) else {
            return Err(WdsError::malformed_index(
                index_path,
                line_number,
                "size or offset corresponding to the extension not found",
            ));
        };

        if offset % BLOCK_SIZE != 0 {
            return Err(WdsError::malformed_index(
                index_path,
                line_number,
                format!(
                    "tar offset is not a multiple of tar block size ({BLOCK_SIZE}), perhaps the size value is exported before offset?"
                ),
            ));
        }

        components.push(IndexComponent {
            ext: ext.to_string(),
            offset,
            size,
        });
    }

    Ok(())
}
