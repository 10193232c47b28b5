//! Flattening of validated records into CSV-ready rows.

use crate::record::{ChannelId, CheckName, Measurement, ShotRecord};
use crate::validate::ValidatedLine;
use std::collections::BTreeSet;

const MEASUREMENTS: [Measurement; 3] = [Measurement::Depth, Measurement::Pressure, Measurement::Timing];

/// Header plus one string row per record, in line order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn number(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn text<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

struct Layout {
    recorded: BTreeSet<CheckName>,
    /// (source, string) pairs with a reported string position.
    strings: BTreeSet<(u8, u8)>,
    separations: BTreeSet<u8>,
    cos_pairs: BTreeSet<(u8, u8)>,
    channels: Vec<(ChannelId, Measurement)>,
}

impl Layout {
    fn discover(records: &[ShotRecord], channels: &[ChannelId]) -> Self {
        let mut recorded = BTreeSet::new();
        let mut strings = BTreeSet::new();
        let mut separations = BTreeSet::new();
        let mut cos_pairs = BTreeSet::new();
        for record in records {
            if let Some(flags) = &record.recorded_flags {
                recorded.extend(flags.keys().copied());
            }
            strings.extend(
                record
                    .sub_arrays
                    .positions
                    .iter()
                    .map(|position| (position.source, position.string)),
            );
            separations.extend(record.sub_arrays.measured_separation.keys().copied());
            cos_pairs.extend(record.sub_arrays.measured_cos.keys().copied());
        }

        let mut ordered: Vec<ChannelId> = channels.to_vec();
        for record in records {
            for channel in record.gun_channels.keys() {
                if !ordered.contains(channel) {
                    ordered.push(*channel);
                }
            }
        }
        let channels = ordered
            .into_iter()
            .flat_map(|channel| MEASUREMENTS.iter().map(move |m| (channel, *m)))
            .filter(|(channel, measurement)| {
                records.iter().any(|record| {
                    record
                        .gun_channels
                        .get(channel)
                        .and_then(|reading| reading.get(*measurement))
                        .is_some()
                })
            })
            .collect();

        Self {
            recorded,
            strings,
            separations,
            cos_pairs,
            channels,
        }
    }

    fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = [
            "line",
            "sequence",
            "shot_point",
            "orphaned",
            "sources",
            "timestamp",
            "point_code",
            "average_depth",
            "water_depth",
            "easting",
            "northing",
            "crossline",
            "radial",
            "inline",
            "sma",
            "sti",
            "dither",
            "volume",
            "autofires",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect();
        headers.extend(self.recorded.iter().map(|check| format!("recorded_{}", check)));
        for (source, string) in &self.strings {
            headers.push(format!("source{}_string{}_easting", source, string));
            headers.push(format!("source{}_string{}_northing", source, string));
        }
        headers.extend(
            self.separations
                .iter()
                .map(|source| format!("separation_source{}", source)),
        );
        headers.extend(self.cos_pairs.iter().map(|(a, b)| format!("cos_{}_{}", a, b)));
        headers.extend(
            self.channels
                .iter()
                .map(|(channel, measurement)| format!("{}_{}", channel, measurement)),
        );
        headers.extend(CheckName::ALL.iter().map(|check| format!("flag_{}", check)));
        headers.push("missing_data".to_string());
        headers.push("flag_discrepancy".to_string());
        headers
    }

    fn row(&self, record: &ShotRecord) -> Vec<String> {
        let sources: Vec<&str> = record.sources.iter().map(|kind| kind.label()).collect();
        let mut row = vec![
            record.line_id.name.clone(),
            text(record.line_id.sequence),
            record.shot_point.to_string(),
            record.is_orphaned().to_string(),
            sources.join("|"),
            text(record.timestamp.map(|time| time.format("%Y-%m-%d %H:%M:%S%.3f"))),
            record.point_code.clone().unwrap_or_default(),
            number(record.average_depth),
            number(record.position.water_depth),
            number(record.position.easting),
            number(record.position.northing),
            number(record.position.crossline),
            number(record.position.radial),
            number(record.position.inline),
            number(record.position.sma),
            number(record.sti),
            text(record.dither),
            number(record.volume),
            text(record.autofires),
        ];
        for check in &self.recorded {
            let state = record
                .recorded_flags
                .as_ref()
                .and_then(|flags| flags.get(check).copied().flatten());
            row.push(text(state));
        }
        for key in &self.strings {
            let position = record
                .sub_arrays
                .positions
                .iter()
                .find(|position| (position.source, position.string) == *key);
            row.push(number(position.map(|position| position.easting)));
            row.push(number(position.map(|position| position.northing)));
        }
        for source in &self.separations {
            row.push(number(record.sub_arrays.measured_separation.get(source).copied()));
        }
        for pair in &self.cos_pairs {
            row.push(number(record.sub_arrays.measured_cos.get(pair).copied()));
        }
        for (channel, measurement) in &self.channels {
            let value = record
                .gun_channels
                .get(channel)
                .and_then(|reading| reading.get(*measurement));
            row.push(number(value));
        }
        for check in CheckName::ALL {
            row.push(text(record.computed_flags.get(check)));
        }
        row.push(record.computed_flags.missing_data().to_string());
        row.push(record.computed_flags.flag_discrepancy().to_string());
        row
    }
}

/// Flattens one validated line: key columns, input fields, one column per
/// channel measurement, one per check, then the two meta-flags.
///
/// `channels` fixes the leading channel order; channels found only on the
/// records are appended. Unevaluated checks are left blank.
pub fn flatten(line: &ValidatedLine, channels: &[ChannelId]) -> FlatTable {
    let layout = Layout::discover(&line.records, channels);
    FlatTable {
        headers: layout.headers(),
        rows: line.records.iter().map(|record| layout.row(record)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ChannelReading, FlagState, LineId, SourceKind, SubArrayPosition};
    use crate::validate::LineFindings;

    fn line() -> ValidatedLine {
        let line_id = LineId::new("3184P3", Some(1885));
        let gun = ChannelId::Gun {
            string: 1,
            cluster: 2,
            gun: 1,
        };
        let mut first = ShotRecord::new(line_id.clone(), 1001);
        first.sources.insert(SourceKind::Primary);
        first.sti = Some(8.1);
        first.computed_flags.raise(CheckName::Sti, FlagState::Ok);
        first.sub_arrays.positions.push(SubArrayPosition {
            source: 2,
            string: 3,
            easting: 612351.5,
            northing: 6712340.25,
        });
        first.gun_channels.insert(
            gun,
            ChannelReading {
                timing: Some(0.5),
                ..ChannelReading::default()
            },
        );

        let mut orphan = ShotRecord::new(line_id.clone(), 1003);
        orphan.sources.insert(SourceKind::GunData);
        orphan.computed_flags.raise(CheckName::Sti, FlagState::MissingData);

        ValidatedLine {
            line_id,
            records: vec![first, orphan],
            findings: LineFindings::default(),
        }
    }

    fn column(table: &FlatTable, name: &str) -> usize {
        table.headers.iter().position(|header| header == name).unwrap()
    }

    #[test]
    fn flatten_emits_one_row_per_record() {
        let table = flatten(&line(), &[]);
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows.iter().all(|row| row.len() == table.headers.len()));
        assert_eq!(table.headers.last().map(String::as_str), Some("flag_discrepancy"));
        assert_eq!(table.rows[0][column(&table, "sequence")], "1885");
        assert_eq!(table.rows[1][column(&table, "orphaned")], "true");
    }

    #[test]
    fn flatten_only_keeps_measurements_that_occur() {
        let table = flatten(&line(), &[]);
        assert!(table.headers.contains(&"String_1-Cluster_2-Gun_1_timing".to_string()));
        assert!(!table.headers.contains(&"String_1-Cluster_2-Gun_1_depth".to_string()));
        let timing = column(&table, "String_1-Cluster_2-Gun_1_timing");
        assert_eq!(table.rows[0][timing], "0.5");
        assert_eq!(table.rows[1][timing], "");
    }

    #[test]
    fn flatten_writes_flag_states_and_meta_flags() {
        let table = flatten(&line(), &[]);
        let sti = column(&table, "flag_sti");
        assert_eq!(table.rows[0][sti], "OK");
        assert_eq!(table.rows[1][sti], "MISSING");
        assert_eq!(table.rows[0][column(&table, "flag_cos")], "");
        assert_eq!(table.rows[1][column(&table, "missing_data")], "true");
    }

    #[test]
    fn flatten_exports_string_positions() {
        let table = flatten(&line(), &[]);
        let easting = column(&table, "source2_string3_easting");
        let northing = column(&table, "source2_string3_northing");
        assert_eq!(northing, easting + 1);
        assert_eq!(table.rows[0][easting], "612351.5");
        assert_eq!(table.rows[0][northing], "6712340.25");
        assert_eq!(table.rows[1][easting], "");
    }
}
