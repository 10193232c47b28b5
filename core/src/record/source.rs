use crate::record::flags::{CheckName, FlagState};
use crate::record::shot::{ChannelId, LineId, Measurement};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// File family a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Primary,
    Comparison,
    Report,
    GunData,
    SourceTiming,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Primary,
        SourceKind::Comparison,
        SourceKind::Report,
        SourceKind::GunData,
        SourceKind::SourceTiming,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Primary => "primary",
            SourceKind::Comparison => "comparison",
            SourceKind::Report => "report",
            SourceKind::GunData => "gun-data",
            SourceKind::SourceTiming => "source-timing",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse grouping of fields used to express merge priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Timestamp,
    PointCode,
    Depth,
    Position,
    Accuracy,
    Sti,
    Dither,
    Volume,
    Autofires,
    RecordedFlags,
    Channels,
    Geometry,
}

/// Canonical identity of one per-shot value, shared by every importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Timestamp,
    PointCode,
    AverageDepth,
    WaterDepth,
    Easting,
    Northing,
    Crossline,
    Radial,
    Inline,
    /// Position uncertainty of one gun array (301, 302, ...).
    Sma(u16),
    Sti,
    Dither,
    Volume,
    Autofires,
    RecordedFlag(CheckName),
    Channel(ChannelId, Measurement),
    StringEasting { source: u8, string: u8 },
    StringNorthing { source: u8, string: u8 },
    MeasuredSeparation(u8),
    MeasuredCos(u8, u8),
}

impl Field {
    pub fn group(self) -> FieldGroup {
        match self {
            Field::Timestamp => FieldGroup::Timestamp,
            Field::PointCode => FieldGroup::PointCode,
            Field::AverageDepth | Field::WaterDepth => FieldGroup::Depth,
            Field::Easting | Field::Northing | Field::Crossline | Field::Radial | Field::Inline => {
                FieldGroup::Position
            }
            Field::Sma(_) => FieldGroup::Accuracy,
            Field::Sti => FieldGroup::Sti,
            Field::Dither => FieldGroup::Dither,
            Field::Volume => FieldGroup::Volume,
            Field::Autofires => FieldGroup::Autofires,
            Field::RecordedFlag(_) => FieldGroup::RecordedFlags,
            Field::Channel(..) => FieldGroup::Channels,
            Field::StringEasting { .. }
            | Field::StringNorthing { .. }
            | Field::MeasuredSeparation(_)
            | Field::MeasuredCos(..) => FieldGroup::Geometry,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Timestamp => f.write_str("timestamp"),
            Field::PointCode => f.write_str("point_code"),
            Field::AverageDepth => f.write_str("average_depth"),
            Field::WaterDepth => f.write_str("water_depth"),
            Field::Easting => f.write_str("easting"),
            Field::Northing => f.write_str("northing"),
            Field::Crossline => f.write_str("crossline"),
            Field::Radial => f.write_str("radial"),
            Field::Inline => f.write_str("inline"),
            Field::Sma(array) => write!(f, "sma_{}", array),
            Field::Sti => f.write_str("sti"),
            Field::Dither => f.write_str("dither"),
            Field::Volume => f.write_str("volume"),
            Field::Autofires => f.write_str("autofires"),
            Field::RecordedFlag(check) => write!(f, "recorded_{}", check),
            Field::Channel(channel, measurement) => write!(f, "{}_{}", channel, measurement),
            Field::StringEasting { source, string } => {
                write!(f, "source{}_string{}_easting", source, string)
            }
            Field::StringNorthing { source, string } => {
                write!(f, "source{}_string{}_northing", source, string)
            }
            Field::MeasuredSeparation(source) => write!(f, "separation_source{}", source),
            Field::MeasuredCos(a, b) => write!(f, "cos_{}_{}", a, b),
        }
    }
}

/// One parsed value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Time(NaiveDateTime),
    /// Recorded flag digit; `None` when the column was blank.
    Flag(Option<FlagState>),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Whether the value carries data (a blank flag digit does not).
    pub fn is_populated(&self) -> bool {
        !matches!(self, FieldValue::Flag(None))
    }

    /// Equality used for collision detection; numbers compare within `tolerance`.
    pub fn agrees_with(&self, other: &FieldValue, tolerance: f64) -> bool {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => (a - b).abs() <= tolerance,
            _ => self == other,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{}", value),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Time(time) => write!(f, "{}", time.format("%Y-%m-%d %H:%M:%S%.3f")),
            FieldValue::Flag(Some(state)) => write!(f, "{}", state),
            FieldValue::Flag(None) => Ok(()),
        }
    }
}

/// One per-shot field mapping produced by an importer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// Line identity when the file carries it; secondary files inherit the line.
    pub line: Option<LineId>,
    pub shot_point: i64,
    /// 1-based physical line in the source file.
    pub row_number: usize,
    pub values: BTreeMap<Field, FieldValue>,
}

impl SourceRow {
    pub fn new(shot_point: i64, row_number: usize) -> Self {
        Self {
            line: None,
            shot_point,
            row_number,
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, field: Field, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub fn has_data(&self) -> bool {
        self.values.values().any(FieldValue::is_populated)
    }
}

/// Why a single row was skipped or partially read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RowIssueKind {
    PartialRecord { length: usize, required: usize },
    UnparsableField { field: String, value: String },
    MissingKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub row_number: usize,
    pub kind: RowIssueKind,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RowIssueKind::PartialRecord { length, required } => write!(
                f,
                "row {}: partial record ({} of {} columns)",
                self.row_number, length, required
            ),
            RowIssueKind::UnparsableField { field, value } => write!(
                f,
                "row {}: cannot parse {} from '{}'",
                self.row_number, field, value
            ),
            RowIssueKind::MissingKey => write!(f, "row {}: no shot point", self.row_number),
        }
    }
}

/// Everything one importer produced from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub kind: SourceKind,
    pub path: Option<PathBuf>,
    pub rows: Vec<SourceRow>,
    pub issues: Vec<RowIssue>,
    /// Gun channels discovered in the header, in column order.
    pub channels: Vec<ChannelId>,
}

impl SourceTable {
    pub fn empty(kind: SourceKind) -> Self {
        Self {
            kind,
            path: None,
            rows: Vec::new(),
            issues: Vec::new(),
            channels: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Shot points actually found in the file.
    pub fn shot_points(&self) -> BTreeSet<i64> {
        self.rows.iter().map(|row| row.shot_point).collect()
    }
}
