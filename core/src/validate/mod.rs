//! QC rule engine. Per-record checks first, then the line-wide passes:
//! separation drift, consecutive-error windows, ordering, dither and the
//! recorded-flag comparison.

pub mod checks;
pub mod discrepancy;
pub mod dither;
pub mod findings;
pub mod ordering;
pub mod separation;
pub mod window;

pub use findings::LineFindings;

use crate::config::ThresholdSet;
use crate::import::DitherReference;
use crate::math::StatsHelper;
use crate::prelude::{ValidationError, ValidationResult};
use crate::record::{ChannelId, CheckName, FlagSet, FlagState, LineId, Measurement, ShotRecord};
use crate::telemetry::{LogManager, Stage};
use crate::validate::findings::{ConsecutiveReport, GunEventKind, SensorAverage};
use std::collections::BTreeMap;

/// One line after validation: records carry their computed flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLine {
    pub line_id: LineId,
    pub records: Vec<ShotRecord>,
    pub findings: LineFindings,
}

pub struct Validator<'a> {
    thresholds: &'a ThresholdSet,
    dither_reference: Option<&'a DitherReference>,
    logger: LogManager,
}

impl<'a> Validator<'a> {
    pub fn new(thresholds: &'a ThresholdSet) -> Self {
        Self {
            thresholds,
            dither_reference: None,
            logger: LogManager::new(Stage::Validate),
        }
    }

    pub fn with_dither_reference(mut self, reference: Option<&'a DitherReference>) -> Self {
        self.dither_reference = reference;
        self
    }

    /// Populates `computed_flags` on every record of one line.
    ///
    /// Flags from an earlier run are discarded first, so validating the same
    /// records twice yields the same flags. Source fields are never touched.
    pub fn validate(
        &self,
        line_id: &LineId,
        mut records: Vec<ShotRecord>,
    ) -> ValidationResult<ValidatedLine> {
        if records.is_empty() {
            return Err(ValidationError::EmptyLine(line_id.clone()));
        }
        let thresholds = self.thresholds;
        let mut findings = LineFindings::default();

        let first_primary = records.iter().position(|record| !record.is_orphaned());
        let mut off_volume = Vec::with_capacity(records.len());
        for (index, record) in records.iter_mut().enumerate() {
            record.computed_flags = FlagSet::default();
            let first_in_line = Some(index) == first_primary;
            off_volume.push(self.check_record(record, first_in_line, &mut findings));
        }

        findings.separation = separation::analyse_separation(
            &mut records,
            &thresholds.sub_array_sep,
            thresholds.source_mode,
        );

        let primary: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.is_orphaned())
            .map(|(index, _)| index)
            .collect();
        let shot_points: Vec<i64> = primary.iter().map(|&index| records[index].shot_point).collect();

        findings.consecutive =
            self.consecutive(line_id, &mut records, &primary, &shot_points, &off_volume)?;
        findings.ordering = ordering::check_ordering(&shot_points);
        findings.missing_shot_points =
            ordering::missing_shot_points(&shot_points, thresholds.shot_increment);
        findings.dither = dither::check_dither(line_id, &mut records, self.dither_reference);
        let (discrepancies, missing_recorded) = discrepancy::compare_recorded_flags(&mut records);
        findings.discrepancies = discrepancies;
        findings.missing_recorded_flags = missing_recorded;
        findings.depth_sensor_averages = self.sensor_averages(&records);

        for record in &records {
            for (check, state) in record.computed_flags.checks() {
                if state == FlagState::MissingData {
                    *findings.insufficient_data.entry(check).or_default() += 1;
                }
            }
        }

        self.log_findings(line_id, &records, &findings);
        Ok(ValidatedLine {
            line_id: line_id.clone(),
            records,
            findings,
        })
    }

    /// Returns whether the shot's firing volume deviates from nominal.
    fn check_record(
        &self,
        record: &mut ShotRecord,
        first_in_line: bool,
        findings: &mut LineFindings,
    ) -> bool {
        let thresholds = self.thresholds;
        let mut states = vec![
            (CheckName::Sti, checks::sti(record, thresholds, first_in_line)),
            (CheckName::GunDepth, checks::gun_depth(record, thresholds)),
            (CheckName::GunPressure, checks::gun_pressure(record, thresholds)),
            (CheckName::SubArraySep, checks::sub_array_sep(record, thresholds)),
            (CheckName::Cos, checks::cos(record, thresholds)),
        ];
        states.extend(checks::position(record, thresholds));
        let (timing, events) = checks::timing(record, thresholds);
        states.push((CheckName::Timing, timing));

        for (check, state) in states {
            record.computed_flags.raise(check, state);
        }

        if record.is_orphaned() {
            return false;
        }
        let misfired = events
            .iter()
            .any(|event| event.kind == GunEventKind::Misfire);
        let off_volume = record
            .volume
            .filter(|volume| !misfired && (volume - thresholds.volume_nominal).abs() > f64::EPSILON);
        if let Some(volume) = off_volume {
            findings.volume_deviations.push((record.shot_point, volume));
        }
        if let Some(autofires) = record.autofires.filter(|count| *count > 0) {
            findings.autofire_shots.push((record.shot_point, autofires));
        }
        findings.gun_events.extend(events);
        off_volume.is_some()
    }

    fn consecutive(
        &self,
        line_id: &LineId,
        records: &mut [ShotRecord],
        primary: &[usize],
        shot_points: &[i64],
        off_volume: &[bool],
    ) -> ValidationResult<ConsecutiveReport> {
        let rules = &self.thresholds.consecutive;
        // A volume deviation is a source error even though it has no flag of its own.
        let errors: Vec<bool> = primary
            .iter()
            .map(|&index| {
                let flags = &records[index].computed_flags;
                off_volume[index] || rules.checks.iter().any(|check| flags.state(*check).is_error())
            })
            .collect();
        let outcome = window::scan(line_id, rules, shot_points, &errors)?;

        for (position, &index) in primary.iter().enumerate() {
            let state = if outcome.marked[position] {
                FlagState::Error
            } else {
                FlagState::Ok
            };
            records[index]
                .computed_flags
                .raise(CheckName::ConsecutiveError, state);
        }

        let error_percent = StatsHelper::percent(outcome.error_count, errors.len());
        Ok(ConsecutiveReport {
            firings: outcome.firings,
            error_shots: outcome.error_count,
            evaluated_shots: errors.len(),
            error_percent,
            total_exceeded: !errors.is_empty() && error_percent >= rules.total_percent,
        })
    }

    fn sensor_averages(&self, records: &[ShotRecord]) -> Vec<SensorAverage> {
        let mut samples: BTreeMap<ChannelId, Vec<f64>> = BTreeMap::new();
        for record in records.iter().filter(|record| !record.is_orphaned()) {
            for (channel, value) in record.channel_values(Measurement::Depth) {
                samples.entry(channel).or_default().push(value);
            }
        }
        samples
            .into_iter()
            .filter_map(|(channel, values)| {
                let mean = StatsHelper::mean(&values)?;
                Some(SensorAverage {
                    channel,
                    mean,
                    samples: values.len(),
                    state: self.thresholds.gun_depth.sensor_average.classify(mean),
                })
            })
            .collect()
    }

    fn log_findings(&self, line_id: &LineId, records: &[ShotRecord], findings: &LineFindings) {
        for check in CheckName::ALL {
            let flagged = records
                .iter()
                .filter(|record| record.computed_flags.state(check) >= FlagState::Warning)
                .count();
            if flagged > 0 {
                self.logger
                    .warn(&format!("line {}: {} shots flagged for {}", line_id, flagged, check));
            }
        }
        for (check, count) in &findings.insufficient_data {
            self.logger.detail(&format!(
                "line {}: {} shots lack the inputs for {}",
                line_id, count, check
            ));
        }
        if findings.ordering.violation {
            self.logger.warn(&format!(
                "line {}: shot point ordering broken ({} issues)",
                line_id,
                findings.ordering.issues.len()
            ));
        }
        if findings.consecutive.total_exceeded {
            self.logger.warn(&format!(
                "line {}: {:.2}% error shots exceeds {}%",
                line_id, findings.consecutive.error_percent, self.thresholds.consecutive.total_percent
            ));
        }
        self.logger.record(&format!(
            "line {}: validated {} records, {} dither findings, {} discrepancies",
            line_id,
            records.len(),
            findings.dither.len(),
            findings.discrepancies.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceKind;

    fn primary_record(shot_point: i64, sti: f64) -> ShotRecord {
        let mut record = ShotRecord::new(LineId::new("L1", Some(7)), shot_point);
        record.sources.insert(SourceKind::Primary);
        record.sti = Some(sti);
        record.dither = Some(0);
        record
    }

    #[test]
    fn empty_line_is_an_error() {
        let thresholds = ThresholdSet::default();
        let err = Validator::new(&thresholds)
            .validate(&LineId::new("L1", None), Vec::new())
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyLine(LineId::new("L1", None)));
    }

    #[test]
    fn first_shot_sti_is_exempt() {
        let thresholds = ThresholdSet::default();
        let records = vec![primary_record(1001, 1.0), primary_record(1003, 1.0)];
        let line = Validator::new(&thresholds)
            .validate(&LineId::new("L1", Some(7)), records)
            .unwrap();
        assert_eq!(line.records[0].computed_flags.state(CheckName::Sti), FlagState::Ok);
        assert_eq!(
            line.records[1].computed_flags.state(CheckName::Sti),
            FlagState::Error
        );
    }

    #[test]
    fn missing_inputs_are_reported_as_insufficient_data() {
        let thresholds = ThresholdSet::default();
        let records = vec![primary_record(1001, 8.0), primary_record(1003, 8.0)];
        let line = Validator::new(&thresholds)
            .validate(&LineId::new("L1", Some(7)), records)
            .unwrap();
        assert_eq!(line.findings.insufficient_data.get(&CheckName::GunDepth), Some(&2));
        assert_eq!(line.findings.insufficient_data.get(&CheckName::Sti), None);
    }
}
