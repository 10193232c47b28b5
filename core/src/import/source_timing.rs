use crate::import::fields::{clean_cell, normalize_header, parse_f64, parse_shot_point, read_text};
use crate::prelude::{ImportError, ImportResult, SourceImporter};
use crate::record::{Field, FieldValue, RowIssue, RowIssueKind, SourceKind, SourceRow, SourceTable};
use crate::telemetry::{LogManager, Stage};
use std::collections::HashMap;
use std::path::Path;

const KEY: &str = "Shot";
const STI_COLUMN: &str = "Shot Time (s) sec";

struct Group {
    key: usize,
    sti: Option<usize>,
}

/// Importer for the source controller summary (`.sbs`).
///
/// The file is paged: every `Shot ...` line opens a new column group, and the
/// groups are joined on their shot value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceTimingImporter;

impl SourceTimingImporter {
    pub fn parse(&self, text: &str, path: &Path) -> ImportResult<SourceTable> {
        let kind = SourceKind::SourceTiming;
        let mut table = SourceTable::empty(kind);
        table.path = Some(path.to_path_buf());

        let mut index_by_shot: HashMap<i64, usize> = HashMap::new();
        let mut group: Option<Group> = None;
        let mut saw_sti = false;

        for (index, raw) in text.lines().enumerate() {
            let row_number = index + 1;
            let line = raw.trim_end_matches('\r');
            let marker = line.trim();
            if marker.is_empty() || marker.starts_with('#') || marker.starts_with("Page") {
                continue;
            }
            if marker.starts_with(KEY) {
                let headers: Vec<String> = line.split('\t').map(normalize_header).collect();
                let key = headers.iter().position(|header| header == KEY).ok_or_else(|| {
                    ImportError::missing_column(kind, path, KEY)
                })?;
                let sti = headers.iter().position(|header| header == STI_COLUMN);
                saw_sti |= sti.is_some();
                group = Some(Group { key, sti });
                continue;
            }

            let Some(current) = &group else {
                return Err(ImportError::malformed_header(
                    kind,
                    path,
                    format!("data on line {} before the first `{}` header", row_number, KEY),
                ));
            };
            let cells: Vec<&str> = line.split('\t').map(clean_cell).collect();
            let key_cell = cells.get(current.key).copied().unwrap_or("");
            let Some(shot_point) = parse_shot_point(key_cell) else {
                let kind = if key_cell.is_empty() {
                    RowIssueKind::MissingKey
                } else {
                    RowIssueKind::UnparsableField {
                        field: KEY.to_string(),
                        value: key_cell.to_string(),
                    }
                };
                table.issues.push(RowIssue { row_number, kind });
                continue;
            };

            let slot = *index_by_shot.entry(shot_point).or_insert_with(|| {
                table.rows.push(SourceRow::new(shot_point, row_number));
                table.rows.len() - 1
            });
            if let Some(sti_index) = current.sti {
                let cell = cells.get(sti_index).copied().unwrap_or("");
                match parse_f64(cell) {
                    Some(value) => table.rows[slot].insert(Field::Sti, FieldValue::Number(value)),
                    None if !cell.is_empty() => table.issues.push(RowIssue {
                        row_number,
                        kind: RowIssueKind::UnparsableField {
                            field: STI_COLUMN.to_string(),
                            value: cell.to_string(),
                        },
                    }),
                    None => {}
                }
            }
        }

        if group.is_none() {
            return Err(ImportError::malformed_header(
                kind,
                path,
                format!("no `{}` header line", KEY),
            ));
        }
        if !saw_sti {
            return Err(ImportError::missing_column(kind, path, STI_COLUMN));
        }
        Ok(table)
    }
}

impl SourceImporter for SourceTimingImporter {
    fn kind(&self) -> SourceKind {
        SourceKind::SourceTiming
    }

    fn import(&self, path: &Path) -> ImportResult<SourceTable> {
        let logger = LogManager::new(Stage::Import);
        let text = read_text(self.kind(), path)?;
        let table = self.parse(&text, path)?;
        for issue in &table.issues {
            logger.warn(&format!("{}: {}", path.display(), issue));
        }
        logger.record(&format!(
            "{} source timing rows from {}",
            table.rows.len(),
            path.display()
        ));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SBS: &str = "# source summary\n\
Shot\tVolume\tShot Time (s) \u{5}sec\n\
1001\t3040\t\n\
1003\t3040\t8.1\u{5}\n\
Page 2\n\
\n\
Shot\tPressure\n\
1001\t2000\n\
1005\t2010\n";

    #[test]
    fn groups_are_joined_on_shot() {
        let table = SourceTimingImporter.parse(SBS, Path::new("s.sbs")).unwrap();
        assert_eq!(
            table.rows.iter().map(|row| row.shot_point).collect::<Vec<_>>(),
            vec![1001, 1003, 1005]
        );
        assert!(!table.rows[0].values.contains_key(&Field::Sti));
        assert_eq!(table.rows[1].values[&Field::Sti], FieldValue::Number(8.1));
        assert!(table.issues.is_empty());
    }

    #[test]
    fn blank_leading_cell_keeps_columns_in_place() {
        let text = "Shot\tVolume\tShot Time (s) sec\n\t3040\t8.1\n1003\t3040\t8.0\n";
        let table = SourceTimingImporter.parse(text, Path::new("s.sbs")).unwrap();
        assert_eq!(
            table.rows.iter().map(|row| row.shot_point).collect::<Vec<_>>(),
            vec![1003]
        );
        assert_eq!(table.issues[0].row_number, 2);
        assert_eq!(table.issues[0].kind, RowIssueKind::MissingKey);
    }

    #[test]
    fn data_before_header_is_malformed() {
        let err = SourceTimingImporter
            .parse("1001\t8.0\n", Path::new("s.sbs"))
            .unwrap_err();
        assert!(matches!(err, ImportError::MalformedHeader { .. }));
    }

    #[test]
    fn file_without_sti_column_is_rejected() {
        let err = SourceTimingImporter
            .parse("Shot\tVolume\n1001\t3040\n", Path::new("s.sbs"))
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn { .. }));
    }
}
