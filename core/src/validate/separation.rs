use crate::config::{SeparationRules, SourceMode};
use crate::math::StatsHelper;
use crate::record::{CheckName, FlagState, ShotRecord};
use crate::validate::checks::separations;
use crate::validate::findings::SeparationSummary;

/// Line-level separation analysis per source.
///
/// An instantaneous out-of-band value is already an ERROR on its record. A
/// full rolling window whose mean leaves the average band raises the records
/// it ends on to WARNING, so sustained drift is visible even while every
/// single value is still inside the band.
pub fn analyse_separation(
    records: &mut [ShotRecord],
    rules: &SeparationRules,
    mode: SourceMode,
) -> Vec<SeparationSummary> {
    let mut summaries = Vec::new();
    for source in 1..=mode.source_count() {
        let series: Vec<(usize, i64, f64)> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.is_orphaned())
            .filter_map(|(index, record)| {
                separations(record, mode)
                    .into_iter()
                    .find(|(candidate, _)| *candidate == source)
                    .map(|(_, value)| (index, record.shot_point, value))
            })
            .collect();
        if series.is_empty() {
            continue;
        }

        let values: Vec<f64> = series.iter().map(|(_, _, value)| *value).collect();
        let out_of_range = values
            .iter()
            .filter(|value| !rules.band.contains(**value))
            .count();
        let percent_out_of_range = StatsHelper::percent(out_of_range, values.len());
        let average = StatsHelper::mean(&values);

        let mut drift_shots = Vec::new();
        let window = rules.rolling_window.max(1);
        for (position, mean) in StatsHelper::rolling_mean(&values, window)
            .into_iter()
            .enumerate()
        {
            if position + 1 < window || rules.average.contains(mean) {
                continue;
            }
            let (index, shot_point, _) = series[position];
            records[index]
                .computed_flags
                .raise(CheckName::SubArraySep, FlagState::Warning);
            drift_shots.push(shot_point);
        }

        summaries.push(SeparationSummary {
            source,
            shots: values.len(),
            out_of_range,
            percent_out_of_range,
            percent_exceeded: percent_out_of_range > rules.percent_threshold,
            average,
            average_state: average.map_or(FlagState::MissingData, |mean| {
                rules.average.classify(mean)
            }),
            drift_shots,
        });
    }
    summaries
}
