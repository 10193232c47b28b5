use crate::import::channels::gun_channel;
use crate::import::fields::{normalize_header, parse_f64, parse_shot_point, read_text};
use crate::prelude::{ImportError, ImportResult, SourceImporter};
use crate::record::{
    ChannelId, Field, FieldValue, RowIssue, RowIssueKind, SourceKind, SourceRow, SourceTable,
};
use crate::telemetry::{LogManager, Stage};
use std::path::Path;

const PREAMBLE_LINES: usize = 4;

#[derive(Debug, Clone, Copy)]
enum Column {
    Key,
    Volume,
    Value(Field),
    Ignored,
}

/// Importer for the gun controller export (`.asc`): four preamble lines, then a
/// whitespace-delimited table with one column per gun channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct GunDataImporter;

impl GunDataImporter {
    pub fn parse(&self, text: &str, path: &Path) -> ImportResult<SourceTable> {
        let mut lines = text.lines().enumerate().skip(PREAMBLE_LINES);
        let (_, header) = lines
            .find(|(_, line)| !line.trim().is_empty())
            .ok_or_else(|| {
                ImportError::malformed_header(SourceKind::GunData, path, "no header after preamble")
            })?;

        let columns: Vec<Column> = header
            .split_whitespace()
            .map(|name| {
                let name = normalize_header(name);
                match name.as_str() {
                    "SHOTPOINT" => Column::Key,
                    "VOLUME" => Column::Volume,
                    other => gun_channel(other)
                        .map(|(channel, measurement)| {
                            Column::Value(Field::Channel(channel, measurement))
                        })
                        .unwrap_or(Column::Ignored),
                }
            })
            .collect();
        let key_index = columns
            .iter()
            .position(|column| matches!(column, Column::Key))
            .ok_or_else(|| ImportError::missing_column(SourceKind::GunData, path, "SHOTPOINT"))?;

        let mut table = SourceTable::empty(SourceKind::GunData);
        table.path = Some(path.to_path_buf());
        for column in &columns {
            if let Column::Value(Field::Channel(channel, _)) = column {
                push_unique(&mut table.channels, *channel);
            }
        }

        for (index, line) in lines {
            let row_number = index + 1;
            let cells: Vec<&str> = line.split_whitespace().collect();
            if cells.is_empty() {
                continue;
            }
            if cells.len() < columns.len() {
                table.issues.push(RowIssue {
                    row_number,
                    kind: RowIssueKind::PartialRecord {
                        length: cells.len(),
                        required: columns.len(),
                    },
                });
                continue;
            }
            let Some(shot_point) = parse_shot_point(cells[key_index]) else {
                table.issues.push(RowIssue {
                    row_number,
                    kind: RowIssueKind::UnparsableField {
                        field: "SHOTPOINT".to_string(),
                        value: cells[key_index].to_string(),
                    },
                });
                continue;
            };

            let mut row = SourceRow::new(shot_point, row_number);
            for (column, cell) in columns.iter().zip(&cells) {
                let field = match column {
                    Column::Volume => Field::Volume,
                    Column::Value(field) => *field,
                    Column::Key | Column::Ignored => continue,
                };
                match parse_f64(cell) {
                    Some(value) => row.insert(field, FieldValue::Number(value)),
                    None => table.issues.push(RowIssue {
                        row_number,
                        kind: RowIssueKind::UnparsableField {
                            field: field.to_string(),
                            value: cell.to_string(),
                        },
                    }),
                }
            }
            table.rows.push(row);
        }
        Ok(table)
    }
}

fn push_unique(channels: &mut Vec<ChannelId>, channel: ChannelId) {
    if !channels.contains(&channel) {
        channels.push(channel);
    }
}

impl SourceImporter for GunDataImporter {
    fn kind(&self) -> SourceKind {
        SourceKind::GunData
    }

    fn import(&self, path: &Path) -> ImportResult<SourceTable> {
        let logger = LogManager::new(Stage::Import);
        let text = read_text(self.kind(), path)?;
        let table = self.parse(&text, path)?;
        for issue in &table.issues {
            logger.warn(&format!("{}: {}", path.display(), issue));
        }
        logger.record(&format!(
            "{} gun data rows, {} gun channels from {}",
            table.rows.len(),
            table.channels.len(),
            path.display()
        ));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Measurement;

    const ASC: &str = "GUN CONTROLLER EXPORT\nproject X\nline 3184P3\n\n\
SHOTPOINT AIM_POINT_TIME VOLUME String_1-Cluster_1-Gun_1 String_1-Cluster_1-Gun_1-Depth String_1-Cluster_1-Gun_1-Pressure String_2-Cluster_1-Gun_1\n\
0001001 12:30:15.000 3040 0.4 -7.1 2010 -0.2\n\
0001003 12:30:23.000 3040 90 -7.0 2005\n\
0001005 12:30:31.000 2980 0.3 -7.2 1995 1.1\n";

    #[test]
    fn channels_are_discovered_from_header() {
        let table = GunDataImporter.parse(ASC, Path::new("g.asc")).unwrap();
        assert_eq!(table.channels.len(), 2);
        assert_eq!(
            table.channels[1],
            ChannelId::Gun {
                string: 2,
                cluster: 1,
                gun: 1
            }
        );
    }

    #[test]
    fn short_rows_are_partial_and_keys_drop_leading_zeros() {
        let table = GunDataImporter.parse(ASC, Path::new("g.asc")).unwrap();
        assert_eq!(table.shot_points().into_iter().collect::<Vec<_>>(), vec![1001, 1005]);
        assert_eq!(
            table.issues[0].kind,
            RowIssueKind::PartialRecord {
                length: 6,
                required: 7
            }
        );
        let gun = ChannelId::Gun {
            string: 1,
            cluster: 1,
            gun: 1,
        };
        let first = &table.rows[0];
        assert_eq!(
            first.values[&Field::Channel(gun, Measurement::Depth)],
            FieldValue::Number(-7.1)
        );
        assert_eq!(first.values[&Field::Volume], FieldValue::Number(3040.0));
    }

    #[test]
    fn missing_shotpoint_column_is_an_error() {
        let text = "a\nb\nc\nd\nSHOT VOLUME\n1 3040\n";
        let err = GunDataImporter.parse(text, Path::new("g.asc")).unwrap_err();
        assert_eq!(err.stage(), "header");
    }
}
