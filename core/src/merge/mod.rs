//! Outer join of importer tables on `(line, shot point)`.

pub mod issue;

pub use issue::{MergeIssue, MergeIssueKind};

use crate::config::MergePolicy;
use crate::record::{
    AdvisoryValue, ChannelId, Field, FieldValue, LineId, ShotRecord, SourceKind, SourceRow,
    SourceTable, SubArrayPosition,
};
use crate::telemetry::{LogManager, Stage};
use std::collections::{BTreeMap, HashMap};

/// Merged records of one line, in line order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedLine {
    pub line_id: LineId,
    pub records: Vec<ShotRecord>,
    /// Every channel discovered across the sources, in discovery order.
    pub channels: Vec<ChannelId>,
    pub issues: Vec<MergeIssue>,
    /// Keys dropped because no source supplied data for them.
    pub dropped: Vec<i64>,
}

impl MergedLine {
    pub fn orphan_count(&self) -> usize {
        self.records.iter().filter(|record| record.is_orphaned()).count()
    }
}

#[derive(Default)]
struct LineBuilder<'t> {
    /// Keys in first-seen primary order, then secondary-only keys.
    order: Vec<i64>,
    rows: HashMap<i64, Vec<(SourceKind, &'t SourceRow)>>,
    duplicates: Vec<(i64, SourceKind, usize)>,
}

impl<'t> LineBuilder<'t> {
    fn push(&mut self, kind: SourceKind, row: &'t SourceRow) {
        let entry = self.rows.entry(row.shot_point).or_default();
        if entry.is_empty() {
            self.order.push(row.shot_point);
        }
        if entry.iter().any(|(seen, _)| *seen == kind) {
            self.duplicates.push((row.shot_point, kind, row.row_number));
        } else {
            entry.push((kind, row));
        }
    }
}

pub struct Merger<'a> {
    policy: &'a MergePolicy,
    logger: LogManager,
}

impl<'a> Merger<'a> {
    pub fn new(policy: &'a MergePolicy) -> Self {
        Self {
            policy,
            logger: LogManager::new(Stage::Merge),
        }
    }

    /// Joins `tables` into one record set per line.
    ///
    /// Rows without a line identity join the primary line that holds their
    /// shot point, otherwise `default_line` (or the first primary line).
    pub fn merge(&self, default_line: Option<&LineId>, tables: &[SourceTable]) -> Vec<MergedLine> {
        let primary_rows = tables
            .iter()
            .filter(|table| table.kind == SourceKind::Primary)
            .flat_map(|table| table.rows.iter());
        let mut line_of_shot: HashMap<i64, LineId> = HashMap::new();
        let mut first_primary_line = None;
        for row in primary_rows {
            if let Some(line) = &row.line {
                first_primary_line.get_or_insert_with(|| line.clone());
                line_of_shot.entry(row.shot_point).or_insert_with(|| line.clone());
            }
        }
        let fallback = default_line
            .cloned()
            .or(first_primary_line)
            .unwrap_or_else(|| LineId::new("unknown", None));

        // Primary tables first so primary order defines record order.
        let mut ordered: Vec<&SourceTable> = tables.iter().collect();
        ordered.sort_by_key(|table| table.kind != SourceKind::Primary);

        let mut lines: Vec<(LineId, LineBuilder<'_>)> = Vec::new();
        let mut channels_by_line: HashMap<LineId, Vec<ChannelId>> = HashMap::new();
        for table in ordered {
            for row in &table.rows {
                let line = row
                    .line
                    .clone()
                    .or_else(|| line_of_shot.get(&row.shot_point).cloned())
                    .unwrap_or_else(|| fallback.clone());
                let slot = match lines.iter().position(|(id, _)| *id == line) {
                    Some(slot) => slot,
                    None => {
                        lines.push((line.clone(), LineBuilder::default()));
                        lines.len() - 1
                    }
                };
                lines[slot].1.push(table.kind, row);
                let channels = channels_by_line.entry(line).or_default();
                for channel in &table.channels {
                    if !channels.contains(channel) {
                        channels.push(*channel);
                    }
                }
            }
        }

        lines
            .into_iter()
            .map(|(line_id, builder)| {
                let channels = channels_by_line.remove(&line_id).unwrap_or_default();
                self.merge_line(line_id, builder, channels)
            })
            .collect()
    }

    fn merge_line(
        &self,
        line_id: LineId,
        builder: LineBuilder<'_>,
        channels: Vec<ChannelId>,
    ) -> MergedLine {
        let mut issues: Vec<MergeIssue> = builder
            .duplicates
            .iter()
            .map(|(shot_point, source, row_number)| MergeIssue {
                line: line_id.clone(),
                shot_point: *shot_point,
                kind: MergeIssueKind::DuplicateKey {
                    source: *source,
                    row_number: *row_number,
                },
            })
            .collect();

        let mut primary = Vec::new();
        let mut orphans = Vec::new();
        let mut dropped = Vec::new();
        for shot_point in &builder.order {
            let rows = builder.rows.get(shot_point).map(Vec::as_slice).unwrap_or(&[]);
            let record = self.merge_record(&line_id, *shot_point, rows, &mut issues);
            if record.sources.is_empty() {
                issues.push(MergeIssue {
                    line: line_id.clone(),
                    shot_point: *shot_point,
                    kind: MergeIssueKind::EmptyRecord,
                });
                dropped.push(*shot_point);
            } else if record.is_orphaned() {
                issues.push(MergeIssue {
                    line: line_id.clone(),
                    shot_point: *shot_point,
                    kind: MergeIssueKind::Orphaned {
                        sources: record.sources.iter().copied().collect(),
                    },
                });
                orphans.push(record);
            } else {
                primary.push(record);
            }
        }

        let descending = match (primary.first(), primary.last()) {
            (Some(first), Some(last)) => last.shot_point < first.shot_point,
            _ => false,
        };
        orphans.sort_by_key(|record| record.shot_point);
        if descending {
            orphans.reverse();
        }
        let mut records = primary;
        records.extend(orphans);
        derive_sti(&mut records);

        let merged = MergedLine {
            line_id,
            records,
            channels,
            issues,
            dropped,
        };
        self.logger.record(&format!(
            "line {}: {} records ({} orphaned, {} dropped, {} issues)",
            merged.line_id,
            merged.records.len(),
            merged.orphan_count(),
            merged.dropped.len(),
            merged.issues.len()
        ));
        merged
    }

    fn merge_record(
        &self,
        line_id: &LineId,
        shot_point: i64,
        rows: &[(SourceKind, &SourceRow)],
        issues: &mut Vec<MergeIssue>,
    ) -> ShotRecord {
        let mut record = ShotRecord::new(line_id.clone(), shot_point);
        for (kind, row) in rows {
            if row.has_data() {
                record.sources.insert(*kind);
            }
        }
        if record.sources.is_empty() {
            return record;
        }

        let mut candidates: BTreeMap<Field, Vec<(SourceKind, &FieldValue)>> = BTreeMap::new();
        for (kind, row) in rows {
            for (field, value) in &row.values {
                candidates.entry(*field).or_default().push((*kind, value));
            }
        }

        let mut strings: BTreeMap<(u8, u8), (Option<f64>, Option<f64>)> = BTreeMap::new();
        for (field, mut values) in candidates {
            let group = field.group();
            values.sort_by_key(|(kind, _)| self.policy.rank(group, *kind));
            let (winner, value) = values[0];
            for (loser, other) in &values[1..] {
                if other.is_populated() {
                    record.advisory.push(AdvisoryValue {
                        field,
                        source: *loser,
                        value: (*other).clone(),
                    });
                }
                if other.is_populated()
                    && !value.agrees_with(other, self.policy.collision_tolerance)
                {
                    issues.push(MergeIssue {
                        line: line_id.clone(),
                        shot_point,
                        kind: MergeIssueKind::FieldCollision {
                            field,
                            kept: winner,
                            kept_value: value.clone(),
                            dropped: *loser,
                            dropped_value: (*other).clone(),
                        },
                    });
                }
            }
            apply(&mut record, field, value, &mut strings);
        }

        for ((source, string), (easting, northing)) in strings {
            if let (Some(easting), Some(northing)) = (easting, northing) {
                record.sub_arrays.positions.push(SubArrayPosition {
                    source,
                    string,
                    easting,
                    northing,
                });
            }
        }
        record
    }
}

fn apply(
    record: &mut ShotRecord,
    field: Field,
    value: &FieldValue,
    strings: &mut BTreeMap<(u8, u8), (Option<f64>, Option<f64>)>,
) {
    if let FieldValue::Flag(state) = value {
        if let Field::RecordedFlag(check) = field {
            record
                .recorded_flags
                .get_or_insert_with(BTreeMap::new)
                .insert(check, *state);
        }
        return;
    }
    match (field, value) {
        (Field::Timestamp, FieldValue::Time(time)) => record.timestamp = Some(*time),
        (Field::PointCode, FieldValue::Text(code)) => record.point_code = Some(code.clone()),
        _ => {}
    }
    let Some(number) = value.as_number() else {
        return;
    };
    match field {
        Field::AverageDepth => record.average_depth = Some(number),
        Field::WaterDepth => record.position.water_depth = Some(number),
        Field::Easting => record.position.easting = Some(number),
        Field::Northing => record.position.northing = Some(number),
        Field::Crossline => record.position.crossline = Some(number),
        Field::Radial => record.position.radial = Some(number),
        Field::Inline => record.position.inline = Some(number),
        Field::Sma(_) => {
            let worst = record.position.sma.map_or(number, |sma| sma.max(number));
            record.position.sma = Some(worst);
        }
        Field::Sti => record.sti = Some(number),
        Field::Dither => record.dither = Some(number.round() as i32),
        Field::Volume => record.volume = Some(number),
        Field::Autofires => record.autofires = Some(number.max(0.0).round() as u32),
        Field::Channel(channel, measurement) => record
            .gun_channels
            .entry(channel)
            .or_default()
            .set(measurement, number),
        Field::StringEasting { source, string } => {
            strings.entry((source, string)).or_default().0 = Some(number)
        }
        Field::StringNorthing { source, string } => {
            strings.entry((source, string)).or_default().1 = Some(number)
        }
        Field::MeasuredSeparation(source) => {
            record.sub_arrays.measured_separation.insert(source, number);
        }
        Field::MeasuredCos(a, b) => {
            record.sub_arrays.measured_cos.insert((a, b), number);
        }
        Field::Timestamp | Field::PointCode | Field::RecordedFlag(_) => {}
    }
}

/// Fills missing STI from the timestamp of the previous primary record.
fn derive_sti(records: &mut [ShotRecord]) {
    let mut previous = None;
    for record in records.iter_mut().filter(|record| !record.is_orphaned()) {
        if record.sti.is_none() {
            if let (Some(before), Some(now)) = (previous, record.timestamp) {
                let elapsed: chrono::Duration = now - before;
                record.sti = Some(elapsed.num_milliseconds() as f64 / 1000.0);
            }
        }
        previous = record.timestamp.or(previous);
    }
}
