use crate::math::StatsHelper;
use crate::validate::findings::{Direction, OrderingIssue, OrderingReport};
use std::collections::HashSet;

/// Large gaps are reported once the step exceeds this multiple of the typical step.
const GAP_FACTOR: i64 = 3;

/// Checks that shot points run strictly one way along the line.
pub fn check_ordering(shot_points: &[i64]) -> OrderingReport {
    let mut report = OrderingReport::default();
    let direction = match (shot_points.first(), shot_points.last()) {
        (Some(first), Some(last)) if last > first => Direction::Ascending,
        (Some(first), Some(last)) if last < first => Direction::Descending,
        _ => match shot_points.windows(2).find(|pair| pair[0] != pair[1]) {
            Some(pair) if pair[1] > pair[0] => Direction::Ascending,
            Some(_) => Direction::Descending,
            None if shot_points.len() > 1 => Direction::Ascending,
            None => return report,
        },
    };
    report.direction = Some(direction);

    let mut seen = HashSet::new();
    for (position, shot_point) in shot_points.iter().enumerate() {
        if !seen.insert(*shot_point) {
            report.issues.push(OrderingIssue::Duplicate {
                shot_point: *shot_point,
                position,
            });
        }
    }

    let typical = StatsHelper::typical_step(shot_points);
    for pair in shot_points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let forward = match direction {
            Direction::Ascending => to > from,
            Direction::Descending => to < from,
        };
        if from != to && !forward {
            report.issues.push(OrderingIssue::Reversal { from, to });
        }
        if let Some(typical) = typical {
            let step = (to - from).abs();
            if forward && step > GAP_FACTOR * typical {
                report.issues.push(OrderingIssue::Gap { from, to, step });
            }
        }
    }

    report.violation = report.issues.iter().any(|issue| {
        matches!(
            issue,
            OrderingIssue::Duplicate { .. } | OrderingIssue::Reversal { .. }
        )
    });
    report
}

/// Shot points expected between consecutive records but absent.
pub fn missing_shot_points(shot_points: &[i64], increment: i64) -> Vec<i64> {
    if increment <= 0 {
        return Vec::new();
    }
    let mut missing = Vec::new();
    for pair in shot_points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let step = if to > from { increment } else { -increment };
        if (to - from).abs() <= increment {
            continue;
        }
        let mut next = from + step;
        while (step > 0 && next < to) || (step < 0 && next > to) {
            missing.push(next);
            next += step;
        }
    }
    missing
}

/// Renders shot points as `"1001-1005, 1011"`, joining runs spaced by `increment`.
pub fn format_ranges(shot_points: &[i64], increment: i64) -> String {
    let mut sorted = shot_points.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let increment = increment.max(1);

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(mut start) = iter.next() else {
        return String::new();
    };
    let mut end = start;
    for value in iter {
        if value - end == increment {
            end = value;
            continue;
        }
        parts.push(render_range(start, end));
        start = value;
        end = value;
    }
    parts.push(render_range(start, end));
    parts.join(", ")
}

fn render_range(start: i64, end: i64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_step_is_a_violation() {
        let report = check_ordering(&[100, 101, 103, 102]);
        assert!(report.violation);
        assert_eq!(report.direction, Some(Direction::Ascending));
        assert!(report
            .issues
            .contains(&OrderingIssue::Reversal { from: 103, to: 102 }));
    }

    #[test]
    fn strict_descent_is_fine() {
        let report = check_ordering(&[500, 499, 498]);
        assert!(!report.violation);
        assert_eq!(report.direction, Some(Direction::Descending));
        assert!(report.issues.is_empty());
    }

    #[test]
    fn duplicates_break_ordering_and_gaps_do_not() {
        let report = check_ordering(&[1001, 1003, 1003, 1005]);
        assert!(report.violation);
        let gapped = check_ordering(&[1001, 1003, 1005, 1021, 1023]);
        assert!(!gapped.violation);
        assert_eq!(
            gapped.issues,
            vec![OrderingIssue::Gap {
                from: 1005,
                to: 1021,
                step: 16
            }]
        );
    }

    #[test]
    fn missing_points_follow_line_direction() {
        assert_eq!(missing_shot_points(&[1001, 1003, 1009], 2), vec![1005, 1007]);
        assert_eq!(missing_shot_points(&[1009, 1003], 2), vec![1007, 1005]);
    }

    #[test]
    fn ranges_are_compressed() {
        assert_eq!(
            format_ranges(&[1001, 1003, 1005, 1011, 1013, 1021], 2),
            "1001-1005, 1011-1013, 1021"
        );
        assert_eq!(format_ranges(&[], 2), "");
    }
}
