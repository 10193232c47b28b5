//! Typed discovery of per-sensor and per-array columns from header names.

use crate::record::{ChannelId, Field, Measurement};
use regex::Regex;
use std::sync::OnceLock;

fn gun_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^String_(\d+)-Cluster_(\d+)-Gun_(\d+)(?:-(Depth|Pressure))?$")
            .expect("Invalid regex for gun channel")
    })
}

fn sensor_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^SSTGM(\d+)([DP])(\d+)_(DPT|PRS) \(P\) Shot Event")
            .expect("Invalid regex for depth/pressure sensor")
    })
}

fn sma_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^Gunarray(\d+) SMA m$").expect("Invalid regex for gun array SMA")
    })
}

fn separation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^SOURCE SSTG(\d+) towed by SST String 1 - 2 Crossline Separation All Shots$")
            .expect("Invalid regex for string separation")
    })
}

fn cos_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^Gunarray30(\d)-Gunarray30(\d) Position m$")
            .expect("Invalid regex for centre of source distance")
    })
}

fn string_position_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^SSTG(\d+) String (\d+) (Easting|Northing) m$")
            .expect("Invalid regex for string position")
    })
}

fn number<T: std::str::FromStr>(captures: &regex::Captures<'_>, group: usize) -> Option<T> {
    captures.get(group)?.as_str().parse().ok()
}

/// Gun channel named `String_<s>-Cluster_<c>-Gun_<g>[-Depth|-Pressure]`.
pub fn gun_channel(header: &str) -> Option<(ChannelId, Measurement)> {
    let captures = gun_pattern().captures(header)?;
    let channel = ChannelId::Gun {
        string: number(&captures, 1)?,
        cluster: number(&captures, 2)?,
        gun: number(&captures, 3)?,
    };
    let measurement = match captures.get(4).map(|m| m.as_str()) {
        Some("Depth") => Measurement::Depth,
        Some("Pressure") => Measurement::Pressure,
        _ => Measurement::Timing,
    };
    Some((channel, measurement))
}

/// Module sensor named `SSTGM<m>D<n>_DPT (P) Shot Event ...` or `SSTGM<m>P<n>_PRS ...`.
pub fn sensor_channel(header: &str) -> Option<(ChannelId, Measurement)> {
    let captures = sensor_pattern().captures(header)?;
    let module = number(&captures, 1)?;
    let index = number(&captures, 3)?;
    match (&captures[2], &captures[4]) {
        ("D", "DPT") => Some((ChannelId::DepthSensor { module, index }, Measurement::Depth)),
        ("P", "PRS") => Some((
            ChannelId::PressureSensor { module, index },
            Measurement::Pressure,
        )),
        _ => None,
    }
}

/// Maps a normalised report header onto the field it carries, if any.
pub fn report_field(header: &str) -> Option<Field> {
    if let Some((channel, measurement)) = sensor_channel(header) {
        return Some(Field::Channel(channel, measurement));
    }
    if let Some(captures) = sma_pattern().captures(header) {
        return Some(Field::Sma(number(&captures, 1)?));
    }
    if let Some(captures) = separation_pattern().captures(header) {
        return Some(Field::MeasuredSeparation(number(&captures, 1)?));
    }
    if let Some(captures) = cos_pattern().captures(header) {
        return Some(Field::MeasuredCos(
            number(&captures, 1)?,
            number(&captures, 2)?,
        ));
    }
    if let Some(captures) = string_position_pattern().captures(header) {
        let source = number(&captures, 1)?;
        let string = number(&captures, 2)?;
        return Some(match &captures[3] {
            "Easting" => Field::StringEasting { source, string },
            _ => Field::StringNorthing { source, string },
        });
    }
    match header {
        "Crossline (m)" => Some(Field::Crossline),
        "Radial (m)" => Some(Field::Radial),
        "Raw: SST_GUN1 #Autofires" => Some(Field::Autofires),
        _ => None,
    }
}

/// Distinct channels in first-seen order.
pub fn discovered_channels<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Vec<ChannelId> {
    let mut channels = Vec::new();
    for field in fields {
        if let Field::Channel(channel, _) = field {
            if !channels.contains(channel) {
                channels.push(*channel);
            }
        }
    }
    channels
}
