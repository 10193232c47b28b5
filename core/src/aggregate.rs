//! Roll-up of validated records into per-line figures for reporting.

use crate::config::ThresholdSet;
use crate::math::StatsHelper;
use crate::record::{CheckName, FlagState, LineId, ShotRecord};
use crate::telemetry::{LogManager, Stage};
use crate::validate::ordering::format_ranges;
use crate::validate::ValidatedLine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Inclusive first/last good shot point; either order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRange {
    pub first: i64,
    pub last: i64,
}

impl ProductionRange {
    pub fn contains(&self, shot_point: i64) -> bool {
        let (low, high) = if self.first <= self.last {
            (self.first, self.last)
        } else {
            (self.last, self.first)
        };
        (low..=high).contains(&shot_point)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckSummary {
    pub check: CheckName,
    pub ok: usize,
    pub warnings: usize,
    pub errors: usize,
    pub missing: usize,
    pub warning_percent: f64,
    pub error_percent: f64,
    pub compliance_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSummary {
    pub line_id: LineId,
    pub first_shot: Option<i64>,
    pub last_shot: Option<i64>,
    pub production_range: Option<ProductionRange>,
    /// Primary-backed records inside the production range.
    pub shots: usize,
    pub orphaned: usize,
    pub checks: Vec<CheckSummary>,
    pub error_shots: usize,
    pub error_percent: f64,
    pub missing_data_shots: usize,
    pub discrepancy_shots: usize,
    /// Gaps in the shot point sequence as `start-end` ranges.
    pub missing_shot_points: String,
    /// Blank recorded-flag digits per check as `start-end` ranges.
    pub missing_flag_ranges: BTreeMap<CheckName, String>,
    pub ordering_violation: bool,
    pub consecutive_violation: bool,
    pub compliant: bool,
}

impl LineSummary {
    pub fn check(&self, check: CheckName) -> Option<&CheckSummary> {
        self.checks.iter().find(|summary| summary.check == check)
    }
}

fn summarize_check(check: CheckName, records: &[&ShotRecord]) -> CheckSummary {
    let mut summary = CheckSummary {
        check,
        ok: 0,
        warnings: 0,
        errors: 0,
        missing: 0,
        warning_percent: 0.0,
        error_percent: 0.0,
        compliance_percent: 100.0,
    };
    for record in records {
        match record.computed_flags.state(check) {
            FlagState::Ok => summary.ok += 1,
            FlagState::MissingData => summary.missing += 1,
            FlagState::Warning => summary.warnings += 1,
            FlagState::Error => summary.errors += 1,
        }
    }
    summary.warning_percent = StatsHelper::percent(summary.warnings, records.len());
    summary.error_percent = StatsHelper::percent(summary.errors, records.len());
    summary.compliance_percent = 100.0 - summary.error_percent;
    summary
}

/// Pure function of the validated line.
pub fn summarize(
    line: &ValidatedLine,
    thresholds: &ThresholdSet,
    production: Option<ProductionRange>,
) -> LineSummary {
    let in_scope: Vec<&ShotRecord> = line
        .records
        .iter()
        .filter(|record| !record.is_orphaned())
        .filter(|record| production.map_or(true, |range| range.contains(record.shot_point)))
        .collect();

    let checks: Vec<CheckSummary> = CheckName::ALL
        .iter()
        .map(|check| summarize_check(*check, &in_scope))
        .collect();
    let counted = &thresholds.consecutive.checks;
    let off_volume: BTreeSet<i64> = line
        .findings
        .volume_deviations
        .iter()
        .map(|(shot_point, _)| *shot_point)
        .collect();
    let error_shots = in_scope
        .iter()
        .filter(|record| {
            off_volume.contains(&record.shot_point)
                || counted
                    .iter()
                    .any(|check| record.computed_flags.state(*check).is_error())
        })
        .count();
    let error_percent = StatsHelper::percent(error_shots, in_scope.len());
    let consecutive_violation = in_scope.iter().any(|record| {
        record
            .computed_flags
            .state(CheckName::ConsecutiveError)
            .is_error()
    });
    let ordering_violation = line.findings.ordering.violation;
    let increment = thresholds.shot_increment;
    let missing_flag_ranges = line
        .findings
        .missing_recorded_flags
        .iter()
        .map(|(check, shots)| (*check, format_ranges(shots, increment)))
        .collect();
    let compliant = !ordering_violation
        && !consecutive_violation
        && error_percent < thresholds.consecutive.total_percent;

    let summary = LineSummary {
        line_id: line.line_id.clone(),
        first_shot: in_scope.first().map(|record| record.shot_point),
        last_shot: in_scope.last().map(|record| record.shot_point),
        production_range: production,
        shots: in_scope.len(),
        orphaned: line.records.iter().filter(|record| record.is_orphaned()).count(),
        checks,
        error_shots,
        error_percent,
        missing_data_shots: in_scope
            .iter()
            .filter(|record| record.computed_flags.missing_data())
            .count(),
        discrepancy_shots: in_scope
            .iter()
            .filter(|record| record.computed_flags.flag_discrepancy())
            .count(),
        missing_shot_points: format_ranges(&line.findings.missing_shot_points, increment),
        missing_flag_ranges,
        ordering_violation,
        consecutive_violation,
        compliant,
    };
    LogManager::new(Stage::Aggregate).record(&format!(
        "line {}: {} shots, {:.2}% errors, compliant: {}",
        summary.line_id, summary.shots, summary.error_percent, summary.compliant
    ));
    summary
}
