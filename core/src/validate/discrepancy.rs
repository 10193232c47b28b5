use crate::record::{CheckName, FlagDiscrepancy, FlagState, Missing, ShotRecord};
use crate::validate::findings::ShotDiscrepancy;
use std::collections::BTreeMap;

/// Recorded flags that are compared with the computed state. The recorded
/// gun depth digit is only checked for blanks.
pub const COMPARED: [CheckName; 4] = [
    CheckName::Timing,
    CheckName::GunPressure,
    CheckName::Radial,
    CheckName::Sma,
];

/// Compares recorded positioning-system flags with the computed ones.
///
/// Blank recorded digits are marked missing and collected per check; a
/// comparison only happens when both sides hold a definite state.
pub fn compare_recorded_flags(
    records: &mut [ShotRecord],
) -> (Vec<ShotDiscrepancy>, BTreeMap<CheckName, Vec<i64>>) {
    let mut discrepancies = Vec::new();
    let mut missing: BTreeMap<CheckName, Vec<i64>> = BTreeMap::new();

    for record in records.iter_mut().filter(|record| !record.is_orphaned()) {
        let Some(recorded) = record.recorded_flags.clone() else {
            continue;
        };
        for (check, state) in recorded {
            let Some(recorded) = state else {
                record.computed_flags.mark_missing(Missing::RecordedFlag(check));
                missing.entry(check).or_default().push(record.shot_point);
                continue;
            };
            if !COMPARED.contains(&check) {
                continue;
            }
            let computed = match record.computed_flags.get(check) {
                Some(FlagState::MissingData) | None => continue,
                Some(computed) => computed,
            };
            if computed != recorded {
                let discrepancy = FlagDiscrepancy {
                    check,
                    recorded,
                    computed,
                };
                record.computed_flags.record_discrepancy(discrepancy);
                discrepancies.push(ShotDiscrepancy {
                    shot_point: record.shot_point,
                    discrepancy,
                });
            }
        }
    }
    (discrepancies, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LineId, SourceKind};

    fn record(shot_point: i64, recorded: &[(CheckName, Option<FlagState>)]) -> ShotRecord {
        let mut record = ShotRecord::new(LineId::new("L1", None), shot_point);
        record.sources.insert(SourceKind::Primary);
        record.recorded_flags = Some(recorded.iter().copied().collect());
        record
    }

    #[test]
    fn mismatch_is_recorded_on_both_sides() {
        let mut records = vec![record(1001, &[(CheckName::Sma, Some(FlagState::Ok))])];
        records[0].computed_flags.raise(CheckName::Sma, FlagState::Error);
        let (found, missing) = compare_recorded_flags(&mut records);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].discrepancy.computed, FlagState::Error);
        assert!(records[0].computed_flags.flag_discrepancy());
        assert!(missing.is_empty());
    }

    #[test]
    fn blank_digits_are_missing_not_discrepant() {
        let mut records = vec![
            record(1001, &[(CheckName::Timing, None)]),
            record(1003, &[(CheckName::Timing, None)]),
        ];
        records[0].computed_flags.raise(CheckName::Timing, FlagState::Error);
        let (found, missing) = compare_recorded_flags(&mut records);
        assert!(found.is_empty());
        assert_eq!(missing[&CheckName::Timing], vec![1001, 1003]);
        assert!(records[1].computed_flags.missing_data());
    }

    #[test]
    fn insufficient_computed_data_is_not_compared() {
        let mut records = vec![record(1001, &[(CheckName::Timing, Some(FlagState::Ok))])];
        records[0]
            .computed_flags
            .raise(CheckName::Timing, FlagState::MissingData);
        let (found, _) = compare_recorded_flags(&mut records);
        assert!(found.is_empty());
    }

    #[test]
    fn gun_depth_digit_is_checked_for_blanks_only() {
        let mut records = vec![
            record(1001, &[(CheckName::GunDepth, Some(FlagState::Ok))]),
            record(1003, &[(CheckName::GunDepth, None)]),
        ];
        records[0].computed_flags.raise(CheckName::GunDepth, FlagState::Error);
        let (found, missing) = compare_recorded_flags(&mut records);
        assert!(found.is_empty());
        assert!(!records[0].computed_flags.flag_discrepancy());
        assert_eq!(missing[&CheckName::GunDepth], vec![1003]);
    }
}
