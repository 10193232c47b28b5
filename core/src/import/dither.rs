use crate::import::fields::{clean_cell, decode, parse_f64, parse_shot_point};
use crate::prelude::ReferenceError;
use crate::record::LineId;
use crate::telemetry::{LogManager, Stage};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Expected dither values used to suggest a value for shots that lack one.
#[derive(Debug, Clone, PartialEq)]
pub enum DitherReference {
    /// Dither in milliseconds per `(line name, shot point)`.
    Keyed(BTreeMap<String, BTreeMap<i64, i32>>),
    /// Repeating dither pattern in milliseconds, in firing order.
    Sequence(Vec<i32>),
}

impl DitherReference {
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let bytes = fs::read(path).map_err(|err| ReferenceError::Unreadable {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let reference = Self::parse(&decode(bytes), path)?;
        LogManager::new(Stage::Import).record(&format!(
            "dither reference {}: {} values",
            path.display(),
            reference.len()
        ));
        Ok(reference)
    }

    /// The first data line decides the layout: three comma-separated cells make
    /// a keyed table, a single number makes a sequence in seconds.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ReferenceError> {
        let malformed = |row_number: usize, value: &str| ReferenceError::Malformed {
            path: path.display().to_string(),
            row_number,
            value: value.to_string(),
        };
        let mut data = text
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .peekable();

        let Some(&(_, first)) = data.peek() else {
            return Err(ReferenceError::Empty {
                path: path.display().to_string(),
            });
        };

        let reference = if first.split(',').count() >= 3 {
            let mut keyed: BTreeMap<String, BTreeMap<i64, i32>> = BTreeMap::new();
            let mut header_checked = false;
            for (row_number, line) in data {
                let cells: Vec<&str> = line.split(',').map(clean_cell).collect();
                let parsed = match cells.as_slice() {
                    [name, shot, dither, ..] => parse_shot_point(shot)
                        .zip(parse_f64(dither))
                        .map(|(shot, dither)| (name.to_string(), shot, dither.round() as i32)),
                    _ => None,
                };
                match parsed {
                    Some((name, shot, dither)) => {
                        keyed.entry(name).or_default().insert(shot, dither);
                    }
                    // A header row is only tolerated in first position.
                    None if !header_checked => {}
                    None => return Err(malformed(row_number, line)),
                }
                header_checked = true;
            }
            DitherReference::Keyed(keyed)
        } else {
            let mut values = Vec::new();
            for (row_number, line) in data {
                let seconds = parse_f64(line).ok_or_else(|| malformed(row_number, line))?;
                values.push(to_millis(seconds));
            }
            DitherReference::Sequence(values)
        };

        if reference.is_empty() {
            return Err(ReferenceError::Empty {
                path: path.display().to_string(),
            });
        }
        Ok(reference)
    }

    pub fn len(&self) -> usize {
        match self {
            DitherReference::Keyed(lines) => lines.values().map(BTreeMap::len).sum(),
            DitherReference::Sequence(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keyed entries for one line.
    pub fn line_entries(&self, line: &LineId) -> Option<&BTreeMap<i64, i32>> {
        match self {
            DitherReference::Keyed(lines) => lines.get(&line.name),
            DitherReference::Sequence(_) => None,
        }
    }
}

pub fn to_millis(seconds: f64) -> i32 {
    (seconds * 1000.0).round() as i32
}
