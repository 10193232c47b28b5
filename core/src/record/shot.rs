use crate::record::flags::{CheckName, FlagSet, FlagState};
use crate::record::source::{Field, FieldValue, SourceKind};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Survey line identity: line name plus acquisition sequence when known.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId {
    pub name: String,
    pub sequence: Option<u32>,
}

impl LineId {
    pub fn new(name: impl Into<String>, sequence: Option<u32>) -> Self {
        Self {
            name: name.into(),
            sequence,
        }
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sequence {
            Some(sequence) => write!(f, "{}/{}", self.name, sequence),
            None => f.write_str(&self.name),
        }
    }
}

/// Sensor or gun identity discovered from a column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChannelId {
    Gun { string: u16, cluster: u16, gun: u16 },
    DepthSensor { module: u16, index: u16 },
    PressureSensor { module: u16, index: u16 },
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Gun {
                string,
                cluster,
                gun,
            } => write!(f, "String_{}-Cluster_{}-Gun_{}", string, cluster, gun),
            ChannelId::DepthSensor { module, index } => write!(f, "SSTGM{}D{}", module, index),
            ChannelId::PressureSensor { module, index } => {
                write!(f, "SSTGM{}P{}", module, index)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Measurement {
    Depth,
    Pressure,
    Timing,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Measurement::Depth => "depth",
            Measurement::Pressure => "pressure",
            Measurement::Timing => "timing",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelReading {
    pub depth: Option<f64>,
    pub pressure: Option<f64>,
    /// Fire-time deviation from nominal in milliseconds.
    pub timing: Option<f64>,
}

impl ChannelReading {
    pub fn get(&self, measurement: Measurement) -> Option<f64> {
        match measurement {
            Measurement::Depth => self.depth,
            Measurement::Pressure => self.pressure,
            Measurement::Timing => self.timing,
        }
    }

    pub fn set(&mut self, measurement: Measurement, value: f64) {
        match measurement {
            Measurement::Depth => self.depth = Some(value),
            Measurement::Pressure => self.pressure = Some(value),
            Measurement::Timing => self.timing = Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub easting: Option<f64>,
    pub northing: Option<f64>,
    pub crossline: Option<f64>,
    pub radial: Option<f64>,
    pub inline: Option<f64>,
    /// Worst semi-major axis across the gun arrays that reported one.
    pub sma: Option<f64>,
    pub water_depth: Option<f64>,
}

/// Position of one string (sub-array) of one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubArrayPosition {
    pub source: u8,
    pub string: u8,
    pub easting: f64,
    pub northing: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubArrayGeometry {
    pub positions: Vec<SubArrayPosition>,
    /// String separation per source as reported by the navigation system.
    pub measured_separation: BTreeMap<u8, f64>,
    /// Centre-of-source distance per adjacent source pair as reported.
    pub measured_cos: BTreeMap<(u8, u8), f64>,
}

impl SubArrayGeometry {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.measured_separation.is_empty() && self.measured_cos.is_empty()
    }
}

/// A value that lost a priority contest during merge, kept for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryValue {
    pub field: Field,
    pub source: SourceKind,
    pub value: FieldValue,
}

/// One shot point of one line, assembled from every source that reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotRecord {
    pub line_id: LineId,
    pub shot_point: i64,
    pub timestamp: Option<NaiveDateTime>,
    /// Firing source code, e.g. `A1`.
    pub point_code: Option<String>,
    pub average_depth: Option<f64>,
    pub position: Position,
    pub gun_channels: BTreeMap<ChannelId, ChannelReading>,
    pub sub_arrays: SubArrayGeometry,
    /// Seconds since the previous shot; `None` for the first shot of a line.
    pub sti: Option<f64>,
    /// Dither in milliseconds.
    pub dither: Option<i32>,
    pub volume: Option<f64>,
    pub autofires: Option<u32>,
    /// Flags as recorded by the positioning system; inner `None` is a blank digit.
    pub recorded_flags: Option<BTreeMap<CheckName, Option<FlagState>>>,
    pub sources: BTreeSet<SourceKind>,
    pub advisory: Vec<AdvisoryValue>,
    pub computed_flags: FlagSet,
}

impl ShotRecord {
    pub fn new(line_id: LineId, shot_point: i64) -> Self {
        Self {
            line_id,
            shot_point,
            timestamp: None,
            point_code: None,
            average_depth: None,
            position: Position::default(),
            gun_channels: BTreeMap::new(),
            sub_arrays: SubArrayGeometry::default(),
            sti: None,
            dither: None,
            volume: None,
            autofires: None,
            recorded_flags: None,
            sources: BTreeSet::new(),
            advisory: Vec::new(),
            computed_flags: FlagSet::default(),
        }
    }

    /// No primary navigation row backs this record.
    pub fn is_orphaned(&self) -> bool {
        !self.sources.contains(&SourceKind::Primary)
    }

    /// Channels in key order that carry `measurement`.
    pub fn channel_values(
        &self,
        measurement: Measurement,
    ) -> impl Iterator<Item = (ChannelId, f64)> + '_ {
        self.gun_channels
            .iter()
            .filter_map(move |(id, reading)| reading.get(measurement).map(|value| (*id, value)))
    }
}
