use crate::import::fields::{clean_cell, column, parse_f64, parse_shot_point, read_text};
use crate::prelude::{ImportResult, SourceImporter};
use crate::record::{
    CheckName, Field, FieldValue, FlagState, LineId, RowIssue, RowIssueKind, SourceKind,
    SourceRow, SourceTable,
};
use crate::telemetry::{LogManager, Stage};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::ops::Range;
use std::path::Path;

const LINE_NAME: Range<usize> = 1..11;
const SHOT_POINT: Range<usize> = 11..21;
const POINT_CODE: Range<usize> = 24..26;
const AVERAGE_DEPTH: Range<usize> = 30..34;
const WATER_DEPTH: Range<usize> = 40..46;
const EASTING: Range<usize> = 46..55;
const NORTHING: Range<usize> = 55..65;
const DAY_OF_YEAR: Range<usize> = 71..74;
const TIME_OF_DAY: Range<usize> = 74..80;
const SEQUENCE: Range<usize> = 87..92;
const YEAR: Range<usize> = 95..97;
const DITHER: Range<usize> = 102..107;

/// Shorter data lines cannot hold the key and timestamp columns.
pub const REQUIRED_LENGTH: usize = 97;

/// Recorded flag digits, one byte each, in file order.
const RECORDED_FLAGS: [(usize, CheckName); 5] = [
    (97, CheckName::GunDepth),
    (98, CheckName::Timing),
    (99, CheckName::GunPressure),
    (100, CheckName::Radial),
    (101, CheckName::Sma),
];

/// Importer for the fixed-width primary shot record file (SPS `S` records).
#[derive(Debug, Clone, Default)]
pub struct PrimaryImporter {
    /// Header lines to skip; `None` skips every leading `H` line.
    pub header_lines: Option<usize>,
}

impl PrimaryImporter {
    pub fn new(header_lines: Option<usize>) -> Self {
        Self { header_lines }
    }

    pub fn parse(&self, text: &str) -> SourceTable {
        let mut table = SourceTable::empty(SourceKind::Primary);
        let mut in_header = true;

        for (index, raw) in text.lines().enumerate() {
            let row_number = index + 1;
            if in_header {
                let skip = match self.header_lines {
                    Some(count) => index < count,
                    None => raw.starts_with('H'),
                };
                if skip {
                    continue;
                }
                in_header = false;
            }

            let line = raw.trim_end_matches('\r');
            if !line.starts_with('S') {
                continue;
            }
            let length = line.chars().count();
            if length < REQUIRED_LENGTH {
                table.issues.push(RowIssue {
                    row_number,
                    kind: RowIssueKind::PartialRecord {
                        length,
                        required: REQUIRED_LENGTH,
                    },
                });
                continue;
            }
            if let Some(row) = parse_record(line, row_number, &mut table.issues) {
                table.rows.push(row);
            }
        }
        table
    }
}

impl SourceImporter for PrimaryImporter {
    fn kind(&self) -> SourceKind {
        SourceKind::Primary
    }

    fn import(&self, path: &Path) -> ImportResult<SourceTable> {
        let logger = LogManager::new(Stage::Import);
        let text = read_text(self.kind(), path)?;
        let mut table = self.parse(&text);
        table.path = Some(path.to_path_buf());

        for issue in &table.issues {
            logger.warn(&format!("{}: {}", path.display(), issue));
        }
        logger.record(&format!(
            "{} records from primary file {}",
            table.rows.len(),
            path.display()
        ));
        Ok(table)
    }
}

fn parse_record(line: &str, row_number: usize, issues: &mut Vec<RowIssue>) -> Option<SourceRow> {
    let mut unparsable = |field: &str, value: &str| {
        issues.push(RowIssue {
            row_number,
            kind: RowIssueKind::UnparsableField {
                field: field.to_string(),
                value: value.trim().to_string(),
            },
        });
    };

    let shot_cell = column(line, SHOT_POINT);
    let Some(shot_point) = parse_shot_point(shot_cell) else {
        unparsable("shot_point", shot_cell);
        return None;
    };

    let mut row = SourceRow::new(shot_point, row_number);
    let sequence = clean_cell(column(line, SEQUENCE)).parse::<u32>().ok();
    row.line = Some(LineId::new(clean_cell(column(line, LINE_NAME)), sequence));

    let code = clean_cell(column(line, POINT_CODE));
    if !code.is_empty() {
        row.insert(Field::PointCode, FieldValue::Text(code.to_string()));
    }

    let numeric = [
        (Field::AverageDepth, AVERAGE_DEPTH),
        (Field::WaterDepth, WATER_DEPTH),
        (Field::Easting, EASTING),
        (Field::Northing, NORTHING),
    ];
    for (field, range) in numeric {
        let cell = column(line, range);
        match parse_f64(cell) {
            Some(value) => row.insert(field, FieldValue::Number(value)),
            None if !clean_cell(cell).is_empty() => unparsable(&field.to_string(), cell),
            None => {}
        }
    }

    match parse_timestamp(line) {
        Some(timestamp) => row.insert(Field::Timestamp, FieldValue::Time(timestamp)),
        None => unparsable("timestamp", column(line, DAY_OF_YEAR.start..TIME_OF_DAY.end)),
    }

    for (offset, check) in RECORDED_FLAGS {
        let digit = column(line, offset..offset + 1)
            .bytes()
            .next()
            .filter(u8::is_ascii_digit)
            .and_then(|byte| FlagState::from_recorded_digit(byte - b'0'));
        row.insert(Field::RecordedFlag(check), FieldValue::Flag(digit));
    }

    let dither_cell = column(line, DITHER);
    match parse_f64(dither_cell) {
        Some(value) => row.insert(Field::Dither, FieldValue::Number(value.round())),
        None if !clean_cell(dither_cell).is_empty() => unparsable("dither", dither_cell),
        None => {}
    }

    Some(row)
}

fn parse_timestamp(line: &str) -> Option<NaiveDateTime> {
    let year = clean_cell(column(line, YEAR)).parse::<i32>().ok()? + 2000;
    let day = clean_cell(column(line, DAY_OF_YEAR)).parse::<u32>().ok()?;
    let time = format!("{:0>6}", clean_cell(column(line, TIME_OF_DAY)));
    let date = NaiveDate::from_yo_opt(year, day)?;
    let time = NaiveTime::parse_from_str(&time, "%H%M%S").ok()?;
    Some(date.and_time(time))
}
