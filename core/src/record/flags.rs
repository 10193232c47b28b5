use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Closed vocabulary of QC checks evaluated per shot point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    Sti,
    GunDepth,
    GunPressure,
    SubArraySep,
    Cos,
    Crossline,
    Radial,
    Sma,
    Timing,
    ConsecutiveError,
}

impl CheckName {
    pub const ALL: [CheckName; 10] = [
        CheckName::Sti,
        CheckName::GunDepth,
        CheckName::GunPressure,
        CheckName::SubArraySep,
        CheckName::Cos,
        CheckName::Crossline,
        CheckName::Radial,
        CheckName::Sma,
        CheckName::Timing,
        CheckName::ConsecutiveError,
    ];

    /// Checks that only look at a single record (everything but the window analysis).
    pub const PER_RECORD: [CheckName; 9] = [
        CheckName::Sti,
        CheckName::GunDepth,
        CheckName::GunPressure,
        CheckName::SubArraySep,
        CheckName::Cos,
        CheckName::Crossline,
        CheckName::Radial,
        CheckName::Sma,
        CheckName::Timing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CheckName::Sti => "sti",
            CheckName::GunDepth => "gun_depth",
            CheckName::GunPressure => "gun_pressure",
            CheckName::SubArraySep => "sub_array_sep",
            CheckName::Cos => "cos",
            CheckName::Crossline => "crossline",
            CheckName::Radial => "radial",
            CheckName::Sma => "sma",
            CheckName::Timing => "timing",
            CheckName::ConsecutiveError => "consecutive_error",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of one check. The declaration order is the precedence order:
/// raising a flag keeps the maximum, so a check can never be downgraded.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagState {
    #[default]
    Ok,
    MissingData,
    Warning,
    Error,
}

impl FlagState {
    /// Maps a recorded positioning-system flag digit (0/1/2).
    pub fn from_recorded_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(FlagState::Ok),
            1 => Some(FlagState::Warning),
            2 => Some(FlagState::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlagState::Ok => "OK",
            FlagState::MissingData => "MISSING",
            FlagState::Warning => "WARNING",
            FlagState::Error => "ERROR",
        }
    }

    pub fn is_error(self) -> bool {
        self == FlagState::Error
    }
}

impl fmt::Display for FlagState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input that was needed but absent for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Missing {
    Check(CheckName),
    Dither,
    RecordedFlag(CheckName),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Check(check) => write!(f, "insufficient data for {}", check),
            Missing::Dither => f.write_str("dither not applied"),
            Missing::RecordedFlag(check) => write!(f, "recorded {} flag blank", check),
        }
    }
}

/// Recorded flag and computed flag disagree for one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagDiscrepancy {
    pub check: CheckName,
    pub recorded: FlagState,
    pub computed: FlagState,
}

/// Per-record flag vector populated by the validator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagSet {
    checks: BTreeMap<CheckName, FlagState>,
    missing: BTreeSet<Missing>,
    discrepancies: Vec<FlagDiscrepancy>,
}

impl FlagSet {
    /// Raises `check` to `state` unless it already holds something more severe.
    pub fn raise(&mut self, check: CheckName, state: FlagState) {
        let slot = self.checks.entry(check).or_insert(state);
        if state > *slot {
            *slot = state;
        }
        if *slot == FlagState::MissingData {
            self.missing.insert(Missing::Check(check));
        } else {
            self.missing.remove(&Missing::Check(check));
        }
    }

    pub fn get(&self, check: CheckName) -> Option<FlagState> {
        self.checks.get(&check).copied()
    }

    /// State of a check, treating an unevaluated check as OK.
    pub fn state(&self, check: CheckName) -> FlagState {
        self.get(check).unwrap_or_default()
    }

    pub fn mark_missing(&mut self, missing: Missing) {
        self.missing.insert(missing);
    }

    pub fn record_discrepancy(&mut self, discrepancy: FlagDiscrepancy) {
        self.discrepancies.push(discrepancy);
    }

    pub fn checks(&self) -> impl Iterator<Item = (CheckName, FlagState)> + '_ {
        self.checks.iter().map(|(check, state)| (*check, *state))
    }

    pub fn missing(&self) -> impl Iterator<Item = &Missing> {
        self.missing.iter()
    }

    pub fn discrepancies(&self) -> &[FlagDiscrepancy] {
        &self.discrepancies
    }

    /// `missing_data` meta-flag.
    pub fn missing_data(&self) -> bool {
        !self.missing.is_empty()
    }

    /// `flag_discrepancy` meta-flag.
    pub fn flag_discrepancy(&self) -> bool {
        !self.discrepancies.is_empty()
    }

    pub fn worst(&self) -> FlagState {
        self.checks.values().copied().max().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.missing.is_empty() && self.discrepancies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_never_downgrades() {
        let mut flags = FlagSet::default();
        flags.raise(CheckName::Sti, FlagState::Error);
        flags.raise(CheckName::Sti, FlagState::Warning);
        flags.raise(CheckName::Sti, FlagState::Ok);
        assert_eq!(flags.state(CheckName::Sti), FlagState::Error);
    }

    #[test]
    fn missing_marker_follows_final_state() {
        let mut flags = FlagSet::default();
        flags.raise(CheckName::Cos, FlagState::MissingData);
        assert!(flags.missing_data());
        flags.raise(CheckName::Cos, FlagState::Warning);
        assert!(!flags.missing_data());
    }

    #[test]
    fn recorded_digits_map_to_states() {
        assert_eq!(FlagState::from_recorded_digit(0), Some(FlagState::Ok));
        assert_eq!(FlagState::from_recorded_digit(2), Some(FlagState::Error));
        assert_eq!(FlagState::from_recorded_digit(7), None);
    }

    #[test]
    fn vocabulary_names_are_fixed() {
        let names: Vec<&str> = CheckName::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names[0], "sti");
        assert_eq!(names[9], "consecutive_error");
        assert_eq!(CheckName::PER_RECORD.len() + 1, CheckName::ALL.len());
    }
}
