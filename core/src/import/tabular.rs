use crate::import::channels::{discovered_channels, report_field};
use crate::import::fields::{clean_cell, normalize_header, parse_f64, parse_shot_point, read_text};
use crate::prelude::{ImportError, ImportResult, SourceImporter};
use crate::record::{
    Field, FieldValue, RowIssue, RowIssueKind, SourceKind, SourceRow, SourceTable,
};
use crate::telemetry::{LogManager, Stage};
use std::path::Path;

/// Column contract of one delimited table.
struct TableLayout<'a> {
    kind: SourceKind,
    key: &'a str,
    /// Line index (0-based) of the header row within the file.
    header_line: usize,
    map: fn(&str) -> Option<Field>,
}

fn parse_table(layout: &TableLayout<'_>, text: &str, path: &Path) -> ImportResult<SourceTable> {
    let body: String = text
        .lines()
        .skip(layout.header_line)
        .collect::<Vec<_>>()
        .join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| ImportError::malformed_header(layout.kind, path, err.to_string()))?
        .iter()
        .map(normalize_header)
        .collect();
    let key_index = headers
        .iter()
        .position(|header| header == layout.key)
        .ok_or_else(|| ImportError::missing_column(layout.kind, path, layout.key))?;
    let columns: Vec<(usize, Field)> = headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| (layout.map)(header).map(|field| (index, field)))
        .collect();

    let mut table = SourceTable::empty(layout.kind);
    table.path = Some(path.to_path_buf());
    table.channels = discovered_channels(columns.iter().map(|(_, field)| field));

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let row_number = err
                    .position()
                    .map(|position| position.line() as usize + layout.header_line)
                    .unwrap_or_default();
                table.issues.push(RowIssue {
                    row_number,
                    kind: RowIssueKind::UnparsableField {
                        field: "row".to_string(),
                        value: err.to_string(),
                    },
                });
                continue;
            }
        };
        let row_number = record
            .position()
            .map(|position| position.line() as usize + layout.header_line)
            .unwrap_or_default();

        let key_cell = record.get(key_index).unwrap_or("");
        let shot_point = match parse_shot_point(key_cell) {
            Some(shot_point) => shot_point,
            None => {
                let kind = if clean_cell(key_cell).is_empty() {
                    RowIssueKind::MissingKey
                } else {
                    RowIssueKind::UnparsableField {
                        field: layout.key.to_string(),
                        value: key_cell.trim().to_string(),
                    }
                };
                table.issues.push(RowIssue { row_number, kind });
                continue;
            }
        };

        let mut row = SourceRow::new(shot_point, row_number);
        for (index, field) in &columns {
            let cell = record.get(*index).unwrap_or("");
            match parse_f64(cell) {
                Some(value) => row.insert(*field, FieldValue::Number(value)),
                None if !clean_cell(cell).is_empty() => table.issues.push(RowIssue {
                    row_number,
                    kind: RowIssueKind::UnparsableField {
                        field: field.to_string(),
                        value: cell.trim().to_string(),
                    },
                }),
                None => {}
            }
        }
        table.rows.push(row);
    }
    Ok(table)
}

fn log_table(table: &SourceTable, path: &Path) {
    let logger = LogManager::new(Stage::Import);
    for issue in &table.issues {
        logger.warn(&format!("{}: {}", path.display(), issue));
    }
    logger.record(&format!(
        "{} {} rows ({} channels) from {}",
        table.rows.len(),
        table.kind,
        table.channels.len(),
        path.display()
    ));
}

fn comparison_field(header: &str) -> Option<Field> {
    match header {
        "Radial (m)" => Some(Field::Radial),
        "Crossline (m)" => Some(Field::Crossline),
        "Inline (m)" => Some(Field::Inline),
        _ => None,
    }
}

/// Importer for the planned-vs-actual comparison table (`*_SPS_Comp.csv`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonImporter;

impl ComparisonImporter {
    const HEADER_MARKER: &'static str = "Code,Line,Shot";

    pub fn parse(&self, text: &str, path: &Path) -> ImportResult<SourceTable> {
        let header_line = text
            .lines()
            .position(|line| line.contains(Self::HEADER_MARKER))
            .ok_or_else(|| {
                ImportError::malformed_header(
                    SourceKind::Comparison,
                    path,
                    format!("no header line containing `{}`", Self::HEADER_MARKER),
                )
            })?;
        let layout = TableLayout {
            kind: SourceKind::Comparison,
            key: "Shot",
            header_line,
            map: comparison_field,
        };
        parse_table(&layout, text, path)
    }
}

impl SourceImporter for ComparisonImporter {
    fn kind(&self) -> SourceKind {
        SourceKind::Comparison
    }

    fn import(&self, path: &Path) -> ImportResult<SourceTable> {
        let text = read_text(self.kind(), path)?;
        let table = self.parse(&text, path)?;
        log_table(&table, path);
        Ok(table)
    }
}

/// Importer for the end-of-line navigation report (`*_EOL_report.csv`).
///
/// Depth and pressure sensors, gun array SMA, string positions and the
/// measured separations are all discovered from the header, so the same
/// importer serves dual and triple source projects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportImporter;

impl ReportImporter {
    pub fn parse(&self, text: &str, path: &Path) -> ImportResult<SourceTable> {
        let layout = TableLayout {
            kind: SourceKind::Report,
            key: "SP",
            header_line: 0,
            map: report_field,
        };
        parse_table(&layout, text, path)
    }
}

impl SourceImporter for ReportImporter {
    fn kind(&self) -> SourceKind {
        SourceKind::Report
    }

    fn import(&self, path: &Path) -> ImportResult<SourceTable> {
        let text = read_text(self.kind(), path)?;
        let table = self.parse(&text, path)?;
        log_table(&table, path);
        Ok(table)
    }
}
