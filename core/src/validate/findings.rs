use crate::record::{ChannelId, CheckName, FlagDiscrepancy, FlagState};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderingIssue {
    Duplicate { shot_point: i64, position: usize },
    Reversal { from: i64, to: i64 },
    Gap { from: i64, to: i64, step: i64 },
}

impl fmt::Display for OrderingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingIssue::Duplicate {
                shot_point,
                position,
            } => write!(f, "duplicate SP {} at position {}", shot_point, position),
            OrderingIssue::Reversal { from, to } => {
                write!(f, "direction reverses between SP {} and SP {}", from, to)
            }
            OrderingIssue::Gap { from, to, step } => {
                write!(f, "gap of {} between SP {} and SP {}", step, from, to)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderingReport {
    pub direction: Option<Direction>,
    /// Set by any duplicate or reversal; gaps alone do not break ordering.
    pub violation: bool,
    pub issues: Vec<OrderingIssue>,
}

/// One firing of a consecutive-error window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowFiring {
    pub size: usize,
    pub limit: usize,
    pub first_shot: i64,
    pub last_shot: i64,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsecutiveReport {
    /// Maximal runs of overlapping firings, merged per window rule.
    pub firings: Vec<WindowFiring>,
    pub error_shots: usize,
    pub evaluated_shots: usize,
    pub error_percent: f64,
    pub total_exceeded: bool,
}

/// Line-level view of one source's string separation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeparationSummary {
    pub source: u8,
    pub shots: usize,
    pub out_of_range: usize,
    pub percent_out_of_range: f64,
    pub percent_exceeded: bool,
    pub average: Option<f64>,
    pub average_state: FlagState,
    /// Shots whose rolling mean left the average band.
    pub drift_shots: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorAverage {
    pub channel: ChannelId,
    pub mean: f64,
    pub samples: usize,
    pub state: FlagState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GunEventKind {
    Disabled,
    Unknown,
    Misfire,
}

impl GunEventKind {
    pub fn from_timing(value: f64) -> Option<Self> {
        let code = value.abs();
        [
            (61.0, GunEventKind::Disabled),
            (63.0, GunEventKind::Unknown),
            (90.0, GunEventKind::Misfire),
        ]
        .into_iter()
        .find(|(special, _)| (code - special).abs() < 1e-9)
        .map(|(_, kind)| kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GunEvent {
    pub shot_point: i64,
    pub channel: ChannelId,
    pub kind: GunEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DitherSuggestion {
    pub value: i32,
    /// Matched only at the relaxed tolerance, or taken from a neighbouring key.
    pub uncertain: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DitherFinding {
    Missing {
        shot_point: i64,
        suggestion: Option<DitherSuggestion>,
    },
    Mismatch {
        shot_point: i64,
        recorded: i32,
        expected: i32,
    },
}

impl fmt::Display for DitherFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DitherFinding::Missing {
                shot_point,
                suggestion: Some(suggestion),
            } => write!(
                f,
                "SP {} may not have dither applied, expected {}{}",
                shot_point,
                suggestion.value,
                if suggestion.uncertain { " (uncertain)" } else { "" }
            ),
            DitherFinding::Missing {
                shot_point,
                suggestion: None,
            } => write!(
                f,
                "SP {} may not have dither applied, expected value unknown",
                shot_point
            ),
            DitherFinding::Mismatch {
                shot_point,
                recorded,
                expected,
            } => write!(
                f,
                "SP {} dither {} differs from reference {}",
                shot_point, recorded, expected
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShotDiscrepancy {
    pub shot_point: i64,
    pub discrepancy: FlagDiscrepancy,
}

/// Everything the validator concludes about a line as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineFindings {
    pub ordering: OrderingReport,
    pub missing_shot_points: Vec<i64>,
    pub consecutive: ConsecutiveReport,
    pub separation: Vec<SeparationSummary>,
    pub depth_sensor_averages: Vec<SensorAverage>,
    pub gun_events: Vec<GunEvent>,
    pub dither: Vec<DitherFinding>,
    pub missing_recorded_flags: BTreeMap<CheckName, Vec<i64>>,
    pub discrepancies: Vec<ShotDiscrepancy>,
    pub autofire_shots: Vec<(i64, u32)>,
    pub volume_deviations: Vec<(i64, f64)>,
    /// Records per check marked "insufficient data".
    pub insufficient_data: BTreeMap<CheckName, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_timing_codes_map_to_events() {
        assert_eq!(GunEventKind::from_timing(-90.0), Some(GunEventKind::Misfire));
        assert_eq!(GunEventKind::from_timing(61.0), Some(GunEventKind::Disabled));
        assert_eq!(GunEventKind::from_timing(1.2), None);
    }

    #[test]
    fn dither_findings_read_naturally() {
        let finding = DitherFinding::Missing {
            shot_point: 4205,
            suggestion: Some(DitherSuggestion {
                value: -58,
                uncertain: true,
            }),
        };
        assert_eq!(
            finding.to_string(),
            "SP 4205 may not have dither applied, expected -58 (uncertain)"
        );
    }
}
