use crate::generator::template::{self, SpsRecord};
use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use navqccore::{LineId, LineSources};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Repeating dither pattern in milliseconds.
const DITHER_PATTERN: [i32; 8] = [-110, -58, -23, 11, 73, -11, 42, -87];
const NOMINAL_VOLUME: f64 = 3040.0;
const MISFIRE_CODE: f64 = 90.0;

/// Configuration for generating a synthetic survey.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub lines: usize,
    pub shots: usize,
    pub seed: u64,
    pub triple: bool,
    pub first_shot: i64,
    pub shot_increment: i64,
    /// Nominal shot interval in seconds.
    pub interval: f64,
    /// Chance per shot of a disturbed reading (bad depth, late shot, misfire).
    pub disturbance: f64,
    /// Chance per shot of a blank dither or flag digit.
    pub dropout: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            lines: 2,
            shots: 200,
            seed: 0,
            triple: false,
            first_shot: 1001,
            shot_increment: 2,
            interval: 8.0,
            disturbance: 0.01,
            dropout: 0.01,
        }
    }
}

impl GeneratorConfig {
    fn sources(&self) -> u8 {
        if self.triple {
            3
        } else {
            2
        }
    }
}

struct Shot {
    shot_point: i64,
    timestamp: NaiveDateTime,
    sti: f64,
    source: u8,
}

fn start_time(line_index: usize) -> anyhow::Result<NaiveDateTime> {
    let midnight = NaiveDate::from_yo_opt(2024, 182)
        .and_then(|date| date.and_hms_opt(6, 0, 0))
        .context("building synthetic start time")?;
    Ok(midnight + Duration::hours(2 * line_index as i64))
}

fn jitter(rng: &mut StdRng, spread: f64) -> f64 {
    rng.gen_range(-spread..=spread)
}

fn shots(config: &GeneratorConfig, line_index: usize, rng: &mut StdRng) -> anyhow::Result<Vec<Shot>> {
    // Odd lines are shot in the opposite direction.
    let step = if line_index % 2 == 0 {
        config.shot_increment
    } else {
        -config.shot_increment
    };
    let first = if step > 0 {
        config.first_shot
    } else {
        config.first_shot + config.shot_increment * (config.shots as i64 - 1)
    };

    let mut timestamp = start_time(line_index)?;
    let mut list = Vec::with_capacity(config.shots);
    for index in 0..config.shots {
        let mut sti = config.interval + jitter(rng, 0.3);
        if rng.gen_bool(config.disturbance) {
            sti = config.interval * 0.7;
        }
        if index > 0 {
            timestamp += Duration::milliseconds((sti * 1000.0).round() as i64);
        }
        list.push(Shot {
            shot_point: first + step * index as i64,
            timestamp,
            sti,
            source: (index % config.sources() as usize) as u8 + 1,
        });
    }
    Ok(list)
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    fs::write(path, contents).with_context(|| format!("writing synthetic file {}", path.display()))
}

fn primary_text(config: &GeneratorConfig, line: &LineId, shots: &[Shot], rng: &mut StdRng) -> String {
    let sequence = line.sequence.unwrap_or_default();
    let mut text = template::sps_header(&line.name, sequence);
    for (index, shot) in shots.iter().enumerate() {
        let dither = DITHER_PATTERN[index % DITHER_PATTERN.len()];
        let flags = if rng.gen_bool(config.dropout) { "0 000" } else { "00000" };
        let point_code = format!("A{}", shot.source);
        let record = SpsRecord {
            line: &line.name,
            sequence,
            shot_point: shot.shot_point,
            point_code: &point_code,
            average_depth: 7.0,
            water_depth: 85.0 + jitter(rng, 2.0),
            easting: 612_000.0 + 25.0 * index as f64,
            northing: 6_712_000.0 + jitter(rng, 0.5),
            timestamp: shot.timestamp,
            flags,
            dither_ms: (!rng.gen_bool(config.dropout)).then_some(dither),
        };
        text.push_str(&template::sps_record(&record));
        text.push('\n');
    }
    text
}

fn comparison_text(line: &LineId, shots: &[Shot], rng: &mut StdRng) -> String {
    let mut text = template::comparison_preamble(&line.name);
    text.push_str(template::COMPARISON_HEADER);
    text.push('\n');
    for shot in shots {
        let _ = writeln!(
            text,
            "S,{},{},{:.2},{:.2},{:.2}",
            line.name,
            shot.shot_point,
            jitter(rng, 3.0),
            jitter(rng, 3.0),
            jitter(rng, 1.0)
        );
    }
    text
}

fn report_text(config: &GeneratorConfig, shots: &[Shot], rng: &mut StdRng) -> String {
    let sources = config.sources();
    let sensors = 2 * u16::from(sources);
    let mut headers = vec!["SP".to_string()];
    headers.extend((1..=sensors).map(|index| template::report_depth_sensor(1, index)));
    headers.extend((1..=sensors).map(|index| template::report_pressure_sensor(1, index)));
    headers.extend((1..=sources).map(|source| template::report_sma(300 + u16::from(source))));
    headers.extend((1..=sources).map(template::report_separation));
    headers.extend((1..sources).map(|source| template::report_cos(source, source + 1)));
    headers.push(template::REPORT_AUTOFIRES.to_string());

    let mut text = headers.join(",");
    text.push('\n');
    for shot in shots {
        let disturbed = rng.gen_bool(config.disturbance);
        let mut cells = vec![shot.shot_point.to_string()];
        for index in 0..sensors {
            let depth = if disturbed && index == 0 {
                -8.4
            } else {
                -7.0 + jitter(rng, 0.3)
            };
            cells.push(format!("{:.2}", depth));
        }
        cells.extend((0..sensors).map(|_| format!("{:.1}", 2000.0 + jitter(rng, 30.0))));
        cells.extend((0..sources).map(|_| format!("{:.2}", 1.0 + jitter(rng, 0.5))));
        cells.extend((0..sources).map(|_| format!("{:.2}", 8.0 + jitter(rng, 0.3))));
        cells.extend((1..sources).map(|_| format!("{:.2}", 37.5 + jitter(rng, 1.0))));
        cells.push(if rng.gen_bool(config.disturbance) { "1" } else { "0" }.to_string());
        text.push_str(&cells.join(","));
        text.push('\n');
    }
    text
}

fn gun_data_text(config: &GeneratorConfig, shots: &[Shot], rng: &mut StdRng) -> String {
    let strings = 2 * u16::from(config.sources());
    let mut headers = vec![
        "SHOTPOINT".to_string(),
        "AIM_POINT_TIME".to_string(),
        "VOLUME".to_string(),
    ];
    for string in 1..=strings {
        headers.push(template::gun_timing(string, 1));
        headers.push(format!("{}-Depth", template::gun_timing(string, 1)));
    }

    let mut text = template::GUN_DATA_PREAMBLE.to_string();
    text.push_str(&headers.join(" "));
    text.push('\n');
    for shot in shots {
        let misfire = rng.gen_bool(config.disturbance / 2.0);
        let volume = if misfire { NOMINAL_VOLUME - 60.0 } else { NOMINAL_VOLUME };
        let mut cells = vec![
            format!("{:07}", shot.shot_point),
            shot.timestamp.format("%H:%M:%S%.3f").to_string(),
            format!("{}", volume),
        ];
        for string in 0..strings {
            let timing = if misfire && string == 0 {
                MISFIRE_CODE
            } else {
                jitter(rng, 0.6)
            };
            cells.push(format!("{:.2}", timing));
            cells.push(format!("{:.2}", -7.0 + jitter(rng, 0.2)));
        }
        text.push_str(&cells.join(" "));
        text.push('\n');
    }
    text
}

fn source_timing_text(shots: &[Shot]) -> String {
    let mut text = String::new();
    for (page, chunk) in shots.chunks(50).enumerate() {
        text.push_str(&template::source_timing_page(page + 1));
        for shot in chunk {
            let _ = writeln!(text, "{}\t{:.3}\tFIRE", shot.shot_point, shot.sti);
        }
    }
    text
}

/// Writes every file family for `config.lines` lines into `dir` and returns
/// the line sources pointing at them.
pub fn write_survey(config: &GeneratorConfig, dir: &Path) -> anyhow::Result<Vec<LineSources>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating synthetic survey directory {}", dir.display()))?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut lines = Vec::with_capacity(config.lines);

    for line_index in 0..config.lines {
        let line = LineId::new(format!("SYN{:03}", line_index + 1), Some(1000 + line_index as u32));
        let shots = shots(config, line_index, &mut rng)?;
        let path = |suffix: &str| -> PathBuf { dir.join(format!("{}{}", line.name, suffix)) };

        let primary = path(".S01");
        write_file(&primary, &primary_text(config, &line, &shots, &mut rng))?;
        let comparison = path("_SPS_Comp.csv");
        write_file(&comparison, &comparison_text(&line, &shots, &mut rng))?;
        let report = path("_EOL_report.csv");
        write_file(&report, &report_text(config, &shots, &mut rng))?;
        let gun_data = path(".asc");
        write_file(&gun_data, &gun_data_text(config, &shots, &mut rng))?;
        let source_timing = path(".sbs");
        write_file(&source_timing, &source_timing_text(&shots))?;

        lines.push(LineSources {
            line: Some(line),
            primary: Some(primary),
            comparison: Some(comparison),
            report: Some(report),
            gun_data: Some(gun_data),
            source_timing: Some(source_timing),
            header_lines: None,
            production_range: None,
        });
    }
    log::info!(
        "synthetic survey: {} lines x {} shots in {}",
        config.lines,
        config.shots,
        dir.display()
    );
    Ok(lines)
}
