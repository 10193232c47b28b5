//! Independent per-record checks. Each returns the worst state over the
//! values it inspected, or `MissingData` when it had nothing to inspect.

use crate::config::{Band, SourceMode, ThresholdSet};
use crate::math::GeometryHelper;
use crate::record::{ChannelId, CheckName, FlagState, Measurement, ShotRecord};
use crate::validate::findings::{GunEvent, GunEventKind};

/// Worst-of roll-up over a set of readings.
pub fn worst_of(band: &Band, values: impl IntoIterator<Item = f64>) -> FlagState {
    values
        .into_iter()
        .map(|value| band.classify(value))
        .max()
        .unwrap_or(FlagState::MissingData)
}

fn single(band: &Band, value: Option<f64>) -> FlagState {
    value.map_or(FlagState::MissingData, |value| band.classify(value))
}

pub fn sti(record: &ShotRecord, thresholds: &ThresholdSet, first_in_line: bool) -> FlagState {
    if first_in_line {
        return FlagState::Ok;
    }
    single(&thresholds.sti, record.sti)
}

pub fn gun_depth(record: &ShotRecord, thresholds: &ThresholdSet) -> FlagState {
    worst_of(
        &thresholds.gun_depth.sensor,
        record
            .channel_values(Measurement::Depth)
            .map(|(_, value)| value),
    )
}

/// Firing source index from a point code such as `A2`.
pub fn firing_source(point_code: Option<&str>) -> Option<u16> {
    let digits = point_code?.trim().strip_prefix('A')?;
    digits.parse().ok().filter(|source| *source > 0)
}

/// Pressure sensors `2k-1` and `2k` belong to source `k`; gun channels are always checked.
pub fn gun_pressure(record: &ShotRecord, thresholds: &ThresholdSet) -> FlagState {
    let source = firing_source(record.point_code.as_deref());
    let values = record
        .channel_values(Measurement::Pressure)
        .filter(|(channel, _)| match (channel, source) {
            (ChannelId::PressureSensor { index, .. }, Some(source)) => {
                *index == 2 * source - 1 || *index == 2 * source
            }
            _ => true,
        })
        .map(|(_, value)| value);
    worst_of(&thresholds.gun_pressure, values)
}

/// String separation per source: the reported value when present, else the
/// minimum distance between that source's string positions.
pub fn separations(record: &ShotRecord, mode: SourceMode) -> Vec<(u8, f64)> {
    (1..=mode.source_count())
        .filter_map(|source| {
            if let Some(value) = record.sub_arrays.measured_separation.get(&source) {
                return Some((source, *value));
            }
            let points = string_points(record, source);
            GeometryHelper::min_pairwise_distance(&points).map(|distance| (source, distance))
        })
        .collect()
}

pub fn sub_array_sep(record: &ShotRecord, thresholds: &ThresholdSet) -> FlagState {
    worst_of(
        &thresholds.sub_array_sep.band,
        separations(record, thresholds.source_mode)
            .into_iter()
            .map(|(_, value)| value),
    )
}

fn string_points(record: &ShotRecord, source: u8) -> Vec<(f64, f64)> {
    record
        .sub_arrays
        .positions
        .iter()
        .filter(|position| position.source == source)
        .map(|position| (position.easting, position.northing))
        .collect()
}

/// Centre-of-source distance per adjacent pair: reported value, else the
/// distance between the two sources' string centroids.
pub fn cos_distances(record: &ShotRecord, mode: SourceMode) -> Vec<((u8, u8), f64)> {
    mode.adjacent_pairs()
        .iter()
        .filter_map(|&(a, b)| {
            if let Some(value) = record.sub_arrays.measured_cos.get(&(a, b)) {
                return Some(((a, b), *value));
            }
            let centre_a = GeometryHelper::centroid(&string_points(record, a))?;
            let centre_b = GeometryHelper::centroid(&string_points(record, b))?;
            Some(((a, b), GeometryHelper::distance(centre_a, centre_b)))
        })
        .collect()
}

pub fn cos(record: &ShotRecord, thresholds: &ThresholdSet) -> FlagState {
    let mode = thresholds.source_mode;
    worst_of(
        thresholds.cos.band(mode),
        cos_distances(record, mode).into_iter().map(|(_, value)| value),
    )
}

pub fn position(record: &ShotRecord, thresholds: &ThresholdSet) -> [(CheckName, FlagState); 3] {
    [
        (
            CheckName::Crossline,
            single(&thresholds.crossline, record.position.crossline),
        ),
        (
            CheckName::Radial,
            single(&thresholds.radial, record.position.radial),
        ),
        (CheckName::Sma, single(&thresholds.sma, record.position.sma)),
    ]
}

/// Timing deviation; special codes are excluded and returned as gun events.
pub fn timing(record: &ShotRecord, thresholds: &ThresholdSet) -> (FlagState, Vec<GunEvent>) {
    let mut events = Vec::new();
    let mut valid = Vec::new();
    for (channel, value) in record.channel_values(Measurement::Timing) {
        match GunEventKind::from_timing(value) {
            Some(kind) => events.push(GunEvent {
                shot_point: record.shot_point,
                channel,
                kind,
            }),
            None => valid.push(value),
        }
    }
    (worst_of(&thresholds.timing, valid), events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ChannelReading, LineId, SubArrayPosition};

    fn record() -> ShotRecord {
        ShotRecord::new(LineId::new("L1", None), 1001)
    }

    fn with_reading(record: &mut ShotRecord, channel: ChannelId, measurement: Measurement, value: f64) {
        record
            .gun_channels
            .entry(channel)
            .or_insert_with(ChannelReading::default)
            .set(measurement, value);
    }

    #[test]
    fn depth_rolls_up_worst_sensor() {
        let mut record = record();
        with_reading(
            &mut record,
            ChannelId::DepthSensor { module: 1, index: 1 },
            Measurement::Depth,
            -6.5,
        );
        with_reading(
            &mut record,
            ChannelId::DepthSensor { module: 1, index: 2 },
            Measurement::Depth,
            -9.0,
        );
        let mut thresholds = ThresholdSet::default();
        thresholds.gun_depth.sensor = Band::range(-8.0, -6.0);
        assert_eq!(gun_depth(&record, &thresholds), FlagState::Error);
    }

    #[test]
    fn no_channels_is_missing_data() {
        let thresholds = ThresholdSet::default();
        assert_eq!(gun_depth(&record(), &thresholds), FlagState::MissingData);
        assert_eq!(sti(&record(), &thresholds, false), FlagState::MissingData);
        assert_eq!(sti(&record(), &thresholds, true), FlagState::Ok);
    }

    #[test]
    fn pressure_only_checks_firing_source_sensors() {
        let mut record = record();
        record.point_code = Some("A2".into());
        with_reading(
            &mut record,
            ChannelId::PressureSensor { module: 1, index: 1 },
            Measurement::Pressure,
            1500.0,
        );
        with_reading(
            &mut record,
            ChannelId::PressureSensor { module: 1, index: 3 },
            Measurement::Pressure,
            2000.0,
        );
        let thresholds = ThresholdSet::default();
        assert_eq!(gun_pressure(&record, &thresholds), FlagState::Ok);
        record.point_code = None;
        assert_eq!(gun_pressure(&record, &thresholds), FlagState::Error);
    }

    #[test]
    fn geometry_is_computed_when_not_reported() {
        let mut record = record();
        let strings = [(1, 1, 0.0), (1, 2, 8.0), (2, 1, 37.5), (2, 2, 45.5)];
        for (source, string, easting) in strings {
            record.sub_arrays.positions.push(SubArrayPosition {
                source,
                string,
                easting,
                northing: 0.0,
            });
        }
        let thresholds = ThresholdSet::default();
        assert_eq!(separations(&record, SourceMode::Dual), vec![(1, 8.0), (2, 8.0)]);
        assert_eq!(cos_distances(&record, SourceMode::Dual), vec![((1, 2), 37.5)]);
        assert_eq!(cos(&record, &thresholds), FlagState::Ok);

        record.sub_arrays.measured_cos.insert((1, 2), 45.0);
        assert_eq!(cos(&record, &thresholds), FlagState::Error);
    }

    #[test]
    fn timing_excludes_special_codes() {
        let mut record = record();
        let gun = |gun| ChannelId::Gun {
            string: 1,
            cluster: 1,
            gun,
        };
        with_reading(&mut record, gun(1), Measurement::Timing, 90.0);
        with_reading(&mut record, gun(2), Measurement::Timing, 1.2);
        let (state, events) = timing(&record, &ThresholdSet::default());
        assert_eq!(state, FlagState::Warning);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GunEventKind::Misfire);
    }

    #[test]
    fn point_code_parsing() {
        assert_eq!(firing_source(Some("A3")), Some(3));
        assert_eq!(firing_source(Some("B1")), None);
        assert_eq!(firing_source(None), None);
    }
}
