//! Cell-level parsing shared by every importer.

use crate::prelude::{ImportError, ImportResult};
use crate::record::SourceKind;
use std::fs;
use std::ops::Range;
use std::path::Path;

/// Reads a text file as UTF-8, falling back to Latin-1 for legacy exports.
pub fn read_text(kind: SourceKind, path: &Path) -> ImportResult<String> {
    let bytes = fs::read(path).map_err(|err| ImportError::unreadable(kind, path, err))?;
    Ok(decode(bytes))
}

pub fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&byte| byte as char).collect(),
    }
}

/// Trims a header cell, drops control bytes and collapses inner whitespace.
pub fn normalize_header(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{5}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn clean_cell(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{5}')
}

pub fn parse_f64(raw: &str) -> Option<f64> {
    let cell = clean_cell(raw);
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Shot point keys may carry leading zeros or a trailing `.0`.
pub fn parse_shot_point(raw: &str) -> Option<i64> {
    let cell = clean_cell(raw);
    if cell.is_empty() {
        return None;
    }
    if let Ok(value) = cell.parse::<i64>() {
        return Some(value);
    }
    let value = cell.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

/// Character-range slice that yields `""` past the end of a short line.
///
/// Columns count characters, not bytes, so a non-ASCII character earlier in
/// the line does not shift later columns.
pub fn column(line: &str, range: Range<usize>) -> &str {
    if range.is_empty() {
        return "";
    }
    let mut boundaries = line
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(line.len()));
    let Some(start) = boundaries.nth(range.start) else {
        return "";
    };
    let end = boundaries.nth(range.len() - 1).unwrap_or(line.len());
    &line[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn headers_collapse_whitespace_and_control_bytes() {
        assert_eq!(
            normalize_header(" SSTGM1P1_PRS (P) Shot Event  "),
            "SSTGM1P1_PRS (P) Shot Event"
        );
        assert_eq!(normalize_header("Shot\u{5} Time  (s) sec"), "Shot Time (s) sec");
    }

    #[test]
    fn shot_points_accept_leading_zeros() {
        assert_eq!(parse_shot_point("0004205"), Some(4205));
        assert_eq!(parse_shot_point("1001.0"), Some(1001));
        assert_eq!(parse_shot_point("10x1"), None);
        assert_eq!(parse_shot_point("  "), None);
    }

    #[test]
    fn column_tolerates_short_lines() {
        assert_eq!(column("S3184P3", 1..11), "3184P3");
        assert_eq!(column("S3184P3", 20..30), "");
    }

    #[test]
    fn column_counts_characters() {
        assert_eq!(column("Sé1234", 2..6), "1234");
        assert_eq!(column("Sé1234", 1..2), "é");
        assert_eq!(column("Sé1234", 4..20), "34");
    }

    #[test]
    fn latin1_files_still_decode() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Shot\tDepth \xb0\n").unwrap();
        let text = read_text(SourceKind::SourceTiming, file.path()).unwrap();
        assert!(text.starts_with("Shot\tDepth"));
        assert!(text.contains('\u{b0}'));
    }
}
