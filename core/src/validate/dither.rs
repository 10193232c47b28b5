use crate::import::DitherReference;
use crate::record::{LineId, Missing, ShotRecord};
use crate::validate::findings::{DitherFinding, DitherSuggestion};
use std::collections::BTreeMap;

/// Pattern length used when matching against a sequence reference.
const PATTERN_LENGTH: usize = 5;
const TOLERANCE_MS: i32 = 2;
const RELAXED_TOLERANCE_MS: i32 = 5;

/// Value that follows the first reference window matching `pattern`.
pub fn match_pattern(pattern: &[i32], reference: &[i32], tolerance: i32) -> Option<i32> {
    if pattern.is_empty() || reference.len() <= pattern.len() {
        return None;
    }
    (0..reference.len() - pattern.len())
        .find(|start| {
            pattern
                .iter()
                .zip(&reference[*start..])
                .all(|(seen, expected)| (seen - expected).abs() <= tolerance)
        })
        .map(|start| reference[start + pattern.len()])
}

fn nearest(entries: &BTreeMap<i64, i32>, shot_point: i64) -> Option<(i64, i32)> {
    let below = entries.range(..=shot_point).next_back();
    let above = entries.range(shot_point..).next();
    match (below, above) {
        (Some(b), Some(a)) if (a.0 - shot_point) < (shot_point - b.0) => Some((*a.0, *a.1)),
        (Some(b), _) => Some((*b.0, *b.1)),
        (None, Some(a)) => Some((*a.0, *a.1)),
        (None, None) => None,
    }
}

/// Flags records without dither and proposes a value. Records are never modified
/// beyond their flag set.
pub fn check_dither(
    line: &LineId,
    records: &mut [ShotRecord],
    reference: Option<&DitherReference>,
) -> Vec<DitherFinding> {
    let mut findings = Vec::new();
    let mut previous: Vec<i32> = Vec::new();

    for record in records.iter_mut().filter(|record| !record.is_orphaned()) {
        let shot_point = record.shot_point;
        match (record.dither, reference) {
            (Some(dither), Some(DitherReference::Keyed(_))) => {
                let expected = reference
                    .and_then(|reference| reference.line_entries(line))
                    .and_then(|entries| entries.get(&shot_point).copied());
                if let Some(expected) = expected.filter(|expected| *expected != dither) {
                    findings.push(DitherFinding::Mismatch {
                        shot_point,
                        recorded: dither,
                        expected,
                    });
                }
            }
            (Some(dither), _) => previous.push(dither),
            (None, reference) => {
                record.computed_flags.mark_missing(Missing::Dither);
                let suggestion = match reference {
                    Some(DitherReference::Sequence(values)) => {
                        let start = previous.len().saturating_sub(PATTERN_LENGTH);
                        let pattern = &previous[start..];
                        let suggestion = match_pattern(pattern, values, TOLERANCE_MS)
                            .map(|value| DitherSuggestion {
                                value,
                                uncertain: false,
                            })
                            .or_else(|| {
                                match_pattern(pattern, values, RELAXED_TOLERANCE_MS).map(
                                    |value| DitherSuggestion {
                                        value,
                                        uncertain: true,
                                    },
                                )
                            });
                        if let Some(suggestion) = suggestion {
                            previous.push(suggestion.value);
                        }
                        suggestion
                    }
                    Some(keyed @ DitherReference::Keyed(_)) => keyed
                        .line_entries(line)
                        .and_then(|entries| nearest(entries, shot_point))
                        .map(|(key, value)| DitherSuggestion {
                            value,
                            uncertain: key != shot_point,
                        }),
                    None => None,
                };
                findings.push(DitherFinding::Missing {
                    shot_point,
                    suggestion,
                });
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceKind;

    fn records(dithers: &[Option<i32>]) -> Vec<ShotRecord> {
        dithers
            .iter()
            .enumerate()
            .map(|(index, dither)| {
                let mut record = ShotRecord::new(LineId::new("L1", None), 4201 + 2 * index as i64);
                record.sources.insert(SourceKind::Primary);
                record.dither = *dither;
                record
            })
            .collect()
    }

    #[test]
    fn pattern_match_returns_following_value() {
        let reference = [-110, -58, -23, 11, 73, -11, -110, -58];
        assert_eq!(match_pattern(&[-57, -24], &reference, 2), Some(11));
        assert_eq!(match_pattern(&[-54, -23], &reference, 2), None);
        assert_eq!(match_pattern(&[-54, -23], &reference, 5), Some(11));
        assert_eq!(match_pattern(&[], &reference, 2), None);
    }

    #[test]
    fn sequence_suggestion_feeds_next_match() {
        let reference = DitherReference::Sequence(vec![-110, -58, -23, 11, 73, -11]);
        let mut records = records(&[Some(-110), Some(-58), None, None]);
        let findings = check_dither(&LineId::new("L1", None), &mut records, Some(&reference));
        assert_eq!(
            findings,
            vec![
                DitherFinding::Missing {
                    shot_point: 4205,
                    suggestion: Some(DitherSuggestion {
                        value: -23,
                        uncertain: false
                    })
                },
                DitherFinding::Missing {
                    shot_point: 4207,
                    suggestion: Some(DitherSuggestion {
                        value: 11,
                        uncertain: false
                    })
                },
            ]
        );
        assert!(records[2].dither.is_none());
        assert!(records[2].computed_flags.missing_data());
    }

    #[test]
    fn keyed_reference_suggests_nearest_and_reports_mismatch() {
        let mut entries = BTreeMap::new();
        entries.insert(4203, -58);
        entries.insert(4206, 11);
        entries.insert(4201, -10);
        let mut lines = BTreeMap::new();
        lines.insert("L1".to_string(), entries);
        let reference = DitherReference::Keyed(lines);
        let mut records = records(&[Some(-12), Some(-58), None]);
        let findings = check_dither(&LineId::new("L1", None), &mut records, Some(&reference));
        assert_eq!(
            findings,
            vec![
                DitherFinding::Mismatch {
                    shot_point: 4201,
                    recorded: -12,
                    expected: -10
                },
                DitherFinding::Missing {
                    shot_point: 4205,
                    suggestion: Some(DitherSuggestion {
                        value: 11,
                        uncertain: true
                    })
                },
            ]
        );
    }

    #[test]
    fn missing_without_reference_has_no_suggestion() {
        let mut records = records(&[None]);
        let findings = check_dither(&LineId::new("L1", None), &mut records, None);
        assert_eq!(
            findings,
            vec![DitherFinding::Missing {
                shot_point: 4201,
                suggestion: None
            }]
        );
    }
}
