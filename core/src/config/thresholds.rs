use crate::prelude::{ConfigError, ConfigResult};
use crate::record::{CheckName, FlagState};
use log::info;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Source array configuration; decides how many sources fire and which COS band applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    #[default]
    Dual,
    Triple,
}

impl SourceMode {
    pub fn source_count(self) -> u8 {
        match self {
            SourceMode::Dual => 2,
            SourceMode::Triple => 3,
        }
    }

    /// Adjacent source pairs whose centre distance is checked.
    pub fn adjacent_pairs(self) -> &'static [(u8, u8)] {
        match self {
            SourceMode::Dual => &[(1, 2)],
            SourceMode::Triple => &[(1, 2), (2, 3)],
        }
    }
}

impl FromStr for SourceMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dual" => Ok(SourceMode::Dual),
            "triple" => Ok(SourceMode::Triple),
            other => Err(ConfigError::UnknownSourceMode(other.to_string())),
        }
    }
}

/// Warning and error limits for one measured quantity.
///
/// A value at or beyond an error limit is ERROR; otherwise a value at or
/// beyond a warning limit is WARNING; anything strictly inside is OK.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Band {
    pub error_below: Option<f64>,
    pub warning_below: Option<f64>,
    pub warning_above: Option<f64>,
    pub error_above: Option<f64>,
}

impl Band {
    /// Error outside `[min, max]`.
    pub const fn range(min: f64, max: f64) -> Self {
        Self {
            error_below: Some(min),
            warning_below: None,
            warning_above: None,
            error_above: Some(max),
        }
    }

    /// Error when `|value|` reaches `limit`.
    pub const fn symmetric(limit: f64) -> Self {
        Self::range(-limit, limit)
    }

    /// Warning (never error) when `|value|` reaches `limit`.
    pub const fn symmetric_warning(limit: f64) -> Self {
        Self {
            error_below: None,
            warning_below: Some(-limit),
            warning_above: Some(limit),
            error_above: None,
        }
    }

    /// Error at or above `limit` only.
    pub const fn upper(limit: f64) -> Self {
        Self {
            error_below: None,
            warning_below: None,
            warning_above: None,
            error_above: Some(limit),
        }
    }

    pub const fn with_warning(mut self, below: Option<f64>, above: Option<f64>) -> Self {
        self.warning_below = below;
        self.warning_above = above;
        self
    }

    pub fn classify(&self, value: f64) -> FlagState {
        if !value.is_finite() {
            return FlagState::MissingData;
        }
        let at_or_below = |limit: Option<f64>| limit.map_or(false, |limit| value <= limit);
        let at_or_above = |limit: Option<f64>| limit.map_or(false, |limit| value >= limit);

        if at_or_below(self.error_below) || at_or_above(self.error_above) {
            FlagState::Error
        } else if at_or_below(self.warning_below) || at_or_above(self.warning_above) {
            FlagState::Warning
        } else {
            FlagState::Ok
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.classify(value) == FlagState::Ok
    }

    fn limits(&self) -> [Option<f64>; 4] {
        [
            self.error_below,
            self.warning_below,
            self.warning_above,
            self.error_above,
        ]
    }

    fn validate(&self, name: &str) -> ConfigResult<()> {
        let invalid = |reason: &str| ConfigError::InvalidBand {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        let limits = self.limits();
        if limits.iter().all(Option::is_none) {
            return Err(invalid("no limits configured"));
        }
        if limits.iter().flatten().any(|limit| !limit.is_finite()) {
            return Err(invalid("limits must be finite"));
        }
        // Present limits must be non-decreasing in declaration order.
        let present: Vec<f64> = limits.iter().flatten().copied().collect();
        if present.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(invalid("limits must satisfy error_below <= warning_below <= warning_above <= error_above"));
        }
        Ok(())
    }
}

/// One consecutive-error window: `limit` or more errors in any `size` consecutive shots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRule {
    pub size: usize,
    pub limit: usize,
}

impl WindowRule {
    pub const fn new(size: usize, limit: usize) -> Self {
        Self { size, limit }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsecutiveRules {
    pub windows: Vec<WindowRule>,
    /// Line-level limit on the share of error shots, in percent.
    pub total_percent: f64,
    /// Checks whose ERROR state counts as an error shot.
    pub checks: Vec<CheckName>,
}

impl Default for ConsecutiveRules {
    fn default() -> Self {
        Self {
            windows: vec![
                WindowRule::new(7, 7),
                WindowRule::new(24, 12),
                WindowRule::new(40, 16),
            ],
            total_percent: 3.0,
            checks: vec![
                CheckName::Sti,
                CheckName::GunDepth,
                CheckName::GunPressure,
                CheckName::Timing,
                CheckName::Sma,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationRules {
    /// Instantaneous string separation limits (metres).
    pub band: Band,
    /// Acceptable band for rolling and whole-line averages.
    pub average: Band,
    /// Line finding when more than this percentage of shots is out of `band`.
    pub percent_threshold: f64,
    /// Shots in the rolling average used to separate drift from spikes.
    pub rolling_window: usize,
}

impl Default for SeparationRules {
    fn default() -> Self {
        Self {
            band: Band::range(6.8, 9.2),
            average: Band::range(7.2, 8.8),
            percent_threshold: 15.0,
            rolling_window: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthRules {
    /// Per-sensor depth limits (metres, negative down).
    pub sensor: Band,
    /// Limits for each sensor's mean over the line.
    pub sensor_average: Band,
}

impl Default for DepthRules {
    fn default() -> Self {
        Self {
            sensor: Band::range(-8.0, -6.0),
            sensor_average: Band::range(-7.5, -6.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosRules {
    pub dual: Band,
    pub triple: Band,
}

impl Default for CosRules {
    fn default() -> Self {
        Self {
            dual: Band::range(33.75, 41.25),
            triple: Band::range(33.75, 41.25),
        }
    }
}

impl CosRules {
    pub fn band(&self, mode: SourceMode) -> &Band {
        match mode {
            SourceMode::Dual => &self.dual,
            SourceMode::Triple => &self.triple,
        }
    }
}

/// Immutable rule set for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    pub source_mode: SourceMode,
    pub sti: Band,
    pub gun_depth: DepthRules,
    pub gun_pressure: Band,
    pub sub_array_sep: SeparationRules,
    pub cos: CosRules,
    pub crossline: Band,
    pub radial: Band,
    pub sma: Band,
    /// Fire-time deviation in milliseconds.
    pub timing: Band,
    pub consecutive: ConsecutiveRules,
    /// Nominal shot point step along a line.
    pub shot_increment: i64,
    /// Nominal total source volume (cu.in.).
    pub volume_nominal: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            source_mode: SourceMode::Dual,
            sti: Band {
                error_below: Some(6.0),
                warning_below: Some(6.25),
                warning_above: Some(10.0),
                error_above: None,
            },
            gun_depth: DepthRules::default(),
            gun_pressure: Band::range(1900.0, 2100.0),
            sub_array_sep: SeparationRules::default(),
            cos: CosRules::default(),
            crossline: Band::symmetric(10.0),
            radial: Band::symmetric_warning(10.0),
            sma: Band::upper(3.0),
            timing: Band::symmetric(1.5).with_warning(Some(-1.0), Some(1.0)),
            consecutive: ConsecutiveRules::default(),
            shot_increment: 2,
            volume_nominal: 3040.0,
        }
    }
}

impl ThresholdSet {
    pub fn band_for(&self, check: CheckName) -> Option<&Band> {
        match check {
            CheckName::Sti => Some(&self.sti),
            CheckName::GunDepth => Some(&self.gun_depth.sensor),
            CheckName::GunPressure => Some(&self.gun_pressure),
            CheckName::SubArraySep => Some(&self.sub_array_sep.band),
            CheckName::Cos => Some(self.cos.band(self.source_mode)),
            CheckName::Crossline => Some(&self.crossline),
            CheckName::Radial => Some(&self.radial),
            CheckName::Sma => Some(&self.sma),
            CheckName::Timing => Some(&self.timing),
            CheckName::ConsecutiveError => None,
        }
    }

    /// Rejects an incomplete or contradictory rule set.
    pub fn validate(&self) -> ConfigResult<()> {
        for check in CheckName::PER_RECORD {
            if let Some(band) = self.band_for(check) {
                band.validate(check.as_str())?;
            }
        }
        self.gun_depth
            .sensor_average
            .validate("gun_depth.sensor_average")?;
        self.sub_array_sep.average.validate("sub_array_sep.average")?;
        self.cos.dual.validate("cos.dual")?;
        self.cos.triple.validate("cos.triple")?;

        let separation = &self.sub_array_sep;
        if !(0.0..=100.0).contains(&separation.percent_threshold) {
            return Err(invalid_value(
                "sub_array_sep.percent_threshold",
                "must be a percentage between 0 and 100",
            ));
        }
        if separation.rolling_window == 0 {
            return Err(invalid_value(
                "sub_array_sep.rolling_window",
                "must be at least 1",
            ));
        }

        let consecutive = &self.consecutive;
        for rule in &consecutive.windows {
            let reason = if rule.size == 0 {
                Some("window size must be positive")
            } else if rule.limit == 0 {
                Some("error limit must be positive")
            } else if rule.limit > rule.size {
                Some("error limit cannot exceed window size")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ConfigError::InvalidWindow {
                    size: rule.size,
                    limit: rule.limit,
                    reason: reason.to_string(),
                });
            }
        }
        if !(consecutive.total_percent > 0.0 && consecutive.total_percent <= 100.0) {
            return Err(invalid_value(
                "consecutive.total_percent",
                "must be in (0, 100]",
            ));
        }
        if consecutive.checks.is_empty() {
            return Err(invalid_value(
                "consecutive.checks",
                "at least one check must count towards consecutive errors",
            ));
        }
        if consecutive.checks.contains(&CheckName::ConsecutiveError) {
            return Err(invalid_value(
                "consecutive.checks",
                "consecutive_error cannot count towards itself",
            ));
        }
        if self.shot_increment <= 0 {
            return Err(invalid_value("shot_increment", "must be positive"));
        }
        if !(self.volume_nominal.is_finite() && self.volume_nominal > 0.0) {
            return Err(invalid_value("volume_nominal", "must be positive"));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            "thresholds: mode {:?}, sti {:?}, depth {:?}, pressure {:?}, cos {:?}",
            self.source_mode,
            self.sti,
            self.gun_depth.sensor,
            self.gun_pressure,
            self.cos.band(self.source_mode)
        );
        info!(
            "thresholds: windows {:?}, total {}%, shot increment {}",
            self.consecutive.windows, self.consecutive.total_percent, self.shot_increment
        );
    }
}

fn invalid_value(name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
