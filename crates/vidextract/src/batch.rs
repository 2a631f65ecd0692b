use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use vidextract_timestamp::{OverlayInstant, ParseError, TimestampFormat};

pub const RANGE_FILE_NAME: &str = "rangetime.txt";

/// One padded interval from a range file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchRow {
    pub start: OverlayInstant,
    pub end: OverlayInstant,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}:{line}: expected 'start,end', got '{content}'", path.display())]
    MalformedRow {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("{}:{line}: {source}", path.display())]
    BadTimestamp {
        path: PathBuf,
        line: usize,
        source: ParseError,
    },

    #[error("no {RANGE_FILE_NAME} found under {}", path.display())]
    NoRangeFiles { path: PathBuf },
}

/// Collects range files under `parent` at any depth, sorted for a stable
/// processing order. Unreadable subdirectories abort the walk rather than
/// silently dropping clips.
pub fn find_range_files(parent: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut found = Vec::new();
    let mut pending = vec![parent.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let own = dir.join(RANGE_FILE_NAME);
        if own.is_file() {
            found.push(own);
        }

        let entries = fs::read_dir(&dir).map_err(|source| BatchError::Io {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| BatchError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            }
        }
    }

    if found.is_empty() {
        return Err(BatchError::NoRangeFiles {
            path: parent.to_path_buf(),
        });
    }
    found.sort();
    Ok(found)
}

/// Parses a range file: a header line, then `start,end` rows in the
/// compact grammar. Each interval is widened by `pad` on both sides so
/// keyframe-aligned cuts keep the moment of interest.
pub fn parse_range_file(path: &Path, pad: chrono::Duration) -> Result<Vec<BatchRow>, BatchError> {
    let contents = fs::read_to_string(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rows = Vec::new();
    for (line_index, line) in contents.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (start_text, end_text) =
            line.split_once(',')
                .ok_or_else(|| BatchError::MalformedRow {
                    path: path.to_path_buf(),
                    line: line_index + 1,
                    content: line.to_string(),
                })?;
        let start = parse_compact(path, line_index + 1, start_text)?;
        let end = parse_compact(path, line_index + 1, end_text)?;
        rows.push(BatchRow {
            start: start.advanced_by(-pad),
            end: end.advanced_by(pad),
        });
    }
    Ok(rows)
}

fn parse_compact(path: &Path, line: usize, text: &str) -> Result<OverlayInstant, BatchError> {
    TimestampFormat::Compact
        .parse(text.trim())
        .map_err(|source| BatchError::BadTimestamp {
            path: path.to_path_buf(),
            line,
            source,
        })
}

/// Output path for one row, next to its range file. Multi-row files get
/// a numbered suffix so clips do not overwrite each other.
pub fn output_for_row(range_file: &Path, output_name: &str, row: usize, total: usize) -> PathBuf {
    let dir = range_file.parent().unwrap_or_else(|| Path::new("."));
    if total <= 1 {
        return dir.join(output_name);
    }
    let name = Path::new(output_name);
    let stem = name
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(output_name);
    match name.extension().and_then(|s| s.to_str()) {
        Some(ext) => dir.join(format!("{stem}-{}.{ext}", row + 1)),
        None => dir.join(format!("{stem}-{}", row + 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_range_file(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join(RANGE_FILE_NAME);
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{contents}").unwrap();
        path
    }

    #[test]
    fn rows_parse_with_padding() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_range_file(
            dir.path(),
            "start,end\n20250613_132726.332,20250613_132730.850\n",
        );

        let rows = parse_range_file(&path, chrono::Duration::zero()).unwrap();
        assert_eq!(rows.len(), 1);
        let width = rows[0].end.since(&rows[0].start).unwrap();
        assert_eq!(width.num_milliseconds(), 4518);

        let padded = parse_range_file(&path, chrono::Duration::seconds(60)).unwrap();
        let width = padded[0].end.since(&padded[0].start).unwrap();
        assert_eq!(width.num_milliseconds(), 4518 + 120_000);
    }

    #[test]
    fn malformed_rows_name_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_range_file(dir.path(), "start,end\nnot a row\n");
        let err = parse_range_file(&path, chrono::Duration::zero()).unwrap_err();
        assert!(matches!(err, BatchError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn header_and_blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_range_file(
            dir.path(),
            "start,end\n\n20250613_132726.332,20250613_132730.850\n\n",
        );
        let rows = parse_range_file(&path, chrono::Duration::zero()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn range_files_are_found_in_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let sub_a = dir.path().join("clip-a");
        let sub_b = dir.path().join("clip-b");
        fs::create_dir_all(&sub_a).unwrap();
        fs::create_dir_all(&sub_b).unwrap();
        write_range_file(&sub_b, "start,end\n");
        write_range_file(&sub_a, "start,end\n");

        let files = find_range_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                sub_a.join(RANGE_FILE_NAME),
                sub_b.join(RANGE_FILE_NAME),
            ]
        );
    }

    #[test]
    fn range_files_are_found_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("camera-1").join("2025-06-13").join("am");
        fs::create_dir_all(&nested).unwrap();
        write_range_file(&nested, "start,end\n");
        write_range_file(dir.path(), "start,end\n");

        let files = find_range_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                nested.join(RANGE_FILE_NAME),
                dir.path().join(RANGE_FILE_NAME),
            ]
        );
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_range_files(dir.path()).unwrap_err();
        assert!(matches!(err, BatchError::NoRangeFiles { .. }));
    }

    #[test]
    fn multi_row_outputs_get_numbered() {
        let file = Path::new("/data/clip/rangetime.txt");
        assert_eq!(
            output_for_row(file, "snippet.mkv", 0, 1),
            Path::new("/data/clip/snippet.mkv")
        );
        assert_eq!(
            output_for_row(file, "snippet.mkv", 1, 3),
            Path::new("/data/clip/snippet-2.mkv")
        );
    }
}
