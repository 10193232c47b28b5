use navqccore::import::DitherReference;
use navqccore::merge::MergeIssueKind;
use navqccore::prelude::NeverCancel;
use navqccore::validate::findings::{DitherFinding, DitherSuggestion};
use navqccore::{
    BatchReport, CheckName, FlagState, LineId, LineSources, MergePolicy, Pipeline, ThresholdSet,
    Validator,
};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BASE_SECONDS: u32 = 12 * 3600 + 30 * 60;

/// One `S` record at `seconds` after 12:30:00 on day 182 of 2024.
fn sps_line(line: &str, shot_point: i64, seconds: u32, dither: Option<i32>) -> String {
    let clock = BASE_SECONDS + seconds;
    let time = format!(
        "{:02}{:02}{:02}",
        clock / 3600,
        (clock / 60) % 60,
        clock % 60
    );
    let mut bytes = vec![b' '; 107];
    let mut put = |offset: usize, text: &str| {
        bytes[offset..offset + text.len()].copy_from_slice(text.as_bytes());
    };
    put(0, "S");
    put(1, line);
    put(11, &format!("{:>10}", shot_point));
    put(24, "A1");
    put(30, " 7.0");
    put(40, "  85.2");
    put(46, " 612345.1");
    put(55, "6712345.2");
    put(71, "182");
    put(74, &time);
    put(87, " 1885");
    put(95, "24");
    put(97, "00000");
    if let Some(dither) = dither {
        put(102, &format!("{:>5}", dither));
    }
    String::from_utf8(bytes).unwrap()
}

/// Shots with their firing time offsets; a dither of `None` leaves the column blank.
fn write_primary(dir: &Path, line: &str, shots: &[(i64, u32, Option<i32>)]) -> PathBuf {
    let mut text = String::from("H00 SPS test header\n");
    for (shot_point, seconds, dither) in shots {
        text.push_str(&sps_line(line, *shot_point, *seconds, *dither));
        text.push('\n');
    }
    let path = dir.join(format!("{}.S01", line));
    fs::write(&path, text).unwrap();
    path
}

fn write_gun_data(dir: &Path, name: &str, rows: &[(i64, [f64; 2])]) -> PathBuf {
    let rows: Vec<(i64, f64, [f64; 2])> = rows
        .iter()
        .map(|(shot_point, depths)| (*shot_point, 3040.0, *depths))
        .collect();
    write_gun_rows(dir, name, &rows)
}

/// Gun data rows as shot point, firing volume and the two gun depths.
fn write_gun_rows(dir: &Path, name: &str, rows: &[(i64, f64, [f64; 2])]) -> PathBuf {
    let mut text = String::from("GUN EXPORT\nproject\nline\n\n");
    text.push_str("SHOTPOINT AIM_POINT_TIME VOLUME String_1-Cluster_1-Gun_1-Depth String_2-Cluster_1-Gun_1-Depth\n");
    for (shot_point, volume, [a, b]) in rows {
        text.push_str(&format!("{:07} 12:30:00.000 {} {} {}\n", shot_point, volume, a, b));
    }
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Evenly timed shots, with the listed shots fired `gap` seconds after their predecessor.
fn timed_shots(first: i64, count: usize, short: &[usize], gap: u32) -> Vec<(i64, u32, Option<i32>)> {
    let mut seconds = 0;
    (0..count)
        .map(|index| {
            if index > 0 {
                seconds += if short.contains(&index) { gap } else { 8 };
            }
            (first + 2 * index as i64, seconds, Some(0))
        })
        .collect()
}

fn run(sources: &[LineSources]) -> BatchReport {
    Pipeline::new(ThresholdSet::default(), MergePolicy::default())
        .run(sources, &NeverCancel)
        .unwrap()
}

fn primary_only(path: PathBuf) -> LineSources {
    LineSources {
        primary: Some(path),
        ..LineSources::default()
    }
}

fn sti_states(report: &BatchReport) -> Vec<FlagState> {
    report.lines[0]
        .validated
        .records
        .iter()
        .map(|record| record.computed_flags.state(CheckName::Sti))
        .collect()
}

#[test]
fn sti_boundaries_take_the_more_severe_state() {
    let dir = TempDir::new().unwrap();
    let shots = vec![
        (1001, 0, Some(0)),
        (1003, 7, Some(0)),
        (1005, 13, Some(0)),
        (1007, 23, Some(0)),
    ];
    let report = run(&[primary_only(write_primary(dir.path(), "3184P3", &shots))]);
    assert_eq!(
        sti_states(&report),
        vec![
            FlagState::Ok,
            FlagState::Ok,
            FlagState::Error,
            FlagState::Warning
        ]
    );
}

#[test]
fn ordering_reversal_is_flagged_but_descending_line_is_not() {
    let dir = TempDir::new().unwrap();
    let broken = [100, 101, 103, 102]
        .iter()
        .enumerate()
        .map(|(index, sp)| (*sp, 8 * index as u32, Some(0)))
        .collect::<Vec<_>>();
    let descending = [500, 499, 498]
        .iter()
        .enumerate()
        .map(|(index, sp)| (*sp, 8 * index as u32, Some(0)))
        .collect::<Vec<_>>();
    let report = run(&[
        primary_only(write_primary(dir.path(), "L100", &broken)),
        primary_only(write_primary(dir.path(), "L500", &descending)),
    ]);
    assert_eq!(report.lines.len(), 2);
    assert!(report.lines[0].validated.findings.ordering.violation);
    assert!(!report.lines[0].summary.compliant);
    assert!(!report.lines[1].validated.findings.ordering.violation);
}

#[test]
fn seven_consecutive_errors_mark_exactly_seven_shots() {
    let dir = TempDir::new().unwrap();
    let shots = timed_shots(1001, 12, &[1, 2, 3, 4, 5, 6, 7], 5);
    let report = run(&[primary_only(write_primary(dir.path(), "3184P3", &shots))]);
    let line = &report.lines[0];
    let marked: Vec<i64> = line
        .validated
        .records
        .iter()
        .filter(|record| {
            record
                .computed_flags
                .state(CheckName::ConsecutiveError)
                .is_error()
        })
        .map(|record| record.shot_point)
        .collect();
    assert_eq!(marked, vec![1003, 1005, 1007, 1009, 1011, 1013, 1015]);
    assert_eq!(line.validated.findings.consecutive.firings.len(), 1);
    assert!(line.summary.consecutive_violation);
}

#[test]
fn scattered_errors_never_fire_a_window() {
    let dir = TempDir::new().unwrap();
    let shots = timed_shots(2001, 40, &[1, 9, 17, 25, 33], 5);
    let report = run(&[primary_only(write_primary(dir.path(), "3184P3", &shots))]);
    let line = &report.lines[0];
    assert_eq!(line.validated.findings.consecutive.error_shots, 5);
    assert!(line.validated.findings.consecutive.firings.is_empty());
    assert!(line.validated.records.iter().all(|record| {
        !record
            .computed_flags
            .state(CheckName::ConsecutiveError)
            .is_error()
    }));
}

#[test]
fn gun_data_only_shot_becomes_an_orphan() {
    let dir = TempDir::new().unwrap();
    let primary = write_primary(dir.path(), "3184P3", &timed_shots(1001, 3, &[], 8));
    let gun_data = write_gun_data(
        dir.path(),
        "3184P3.asc",
        &[
            (1001, [-7.0, -7.1]),
            (1003, [-7.0, -7.1]),
            (1005, [-7.0, -7.1]),
            (1007, [-7.0, -7.1]),
        ],
    );
    let report = run(&[LineSources {
        primary: Some(primary),
        gun_data: Some(gun_data),
        ..LineSources::default()
    }]);
    let line = &report.lines[0];
    let last = line.validated.records.last().unwrap();
    assert_eq!(last.shot_point, 1007);
    assert!(last.is_orphaned());
    assert!(line
        .merge_issues
        .iter()
        .any(|issue| issue.shot_point == 1007
            && matches!(issue.kind, MergeIssueKind::Orphaned { .. })));
    assert!(!line.validated.findings.ordering.violation);
    assert_eq!(line.summary.shots, 3);
    assert_eq!(line.summary.orphaned, 1);
}

#[test]
fn one_bad_sensor_depth_makes_the_shot_an_error() {
    let dir = TempDir::new().unwrap();
    let primary = write_primary(dir.path(), "3184P3", &timed_shots(1001, 2, &[], 8));
    let gun_data = write_gun_data(
        dir.path(),
        "3184P3.asc",
        &[(1001, [-7.0, -7.1]), (1003, [-6.5, -9.0])],
    );
    let report = run(&[LineSources {
        primary: Some(primary),
        gun_data: Some(gun_data),
        ..LineSources::default()
    }]);
    let records = &report.lines[0].validated.records;
    assert_eq!(records[0].computed_flags.state(CheckName::GunDepth), FlagState::Ok);
    assert_eq!(
        records[1].computed_flags.state(CheckName::GunDepth),
        FlagState::Error
    );
}

#[test]
fn seven_off_nominal_volumes_fire_the_consecutive_window() {
    let dir = TempDir::new().unwrap();
    let shots = timed_shots(1001, 12, &[], 8);
    let primary = write_primary(dir.path(), "3184P3", &shots);
    let rows: Vec<(i64, f64, [f64; 2])> = shots
        .iter()
        .enumerate()
        .map(|(index, (shot_point, _, _))| {
            let volume = if (2..9).contains(&index) { 2800.0 } else { 3040.0 };
            (*shot_point, volume, [-7.0, -7.1])
        })
        .collect();
    let gun_data = write_gun_rows(dir.path(), "3184P3.asc", &rows);
    let report = run(&[LineSources {
        primary: Some(primary),
        gun_data: Some(gun_data),
        ..LineSources::default()
    }]);
    let line = &report.lines[0];
    assert_eq!(line.validated.findings.volume_deviations.len(), 7);
    assert_eq!(line.validated.findings.consecutive.error_shots, 7);
    let marked: Vec<i64> = line
        .validated
        .records
        .iter()
        .filter(|record| {
            record
                .computed_flags
                .state(CheckName::ConsecutiveError)
                .is_error()
        })
        .map(|record| record.shot_point)
        .collect();
    assert_eq!(marked, vec![1005, 1007, 1009, 1011, 1013, 1015, 1017]);
    assert!(line.summary.consecutive_violation);
    assert_eq!(line.summary.error_shots, 7);
}

#[test]
fn recorded_flags_disagreeing_with_computed_are_discrepancies() {
    let dir = TempDir::new().unwrap();
    let mut text = String::from("H00 SPS test header\n");
    for (shot_point, seconds, flags) in [(1001, 0, "00000"), (1003, 8, "20000")] {
        let mut record = sps_line("3184P3", shot_point, seconds, Some(0));
        record.replace_range(97..102, flags);
        text.push_str(&record);
        text.push('\n');
    }
    let primary = dir.path().join("3184P3.S01");
    fs::write(&primary, text).unwrap();
    let gun_data = dir.path().join("3184P3.asc");
    fs::write(
        &gun_data,
        "GUN EXPORT\nproject\nline\n\n\
SHOTPOINT AIM_POINT_TIME VOLUME String_1-Cluster_1-Gun_1-Depth String_1-Cluster_1-Gun_1-Pressure\n\
0001001 12:30:00.000 3040 -7.0 1800\n\
0001003 12:30:08.000 3040 -7.0 2000\n",
    )
    .unwrap();

    let report = run(&[LineSources {
        primary: Some(primary),
        gun_data: Some(gun_data),
        ..LineSources::default()
    }]);
    let line = &report.lines[0];
    let found: Vec<(i64, CheckName, FlagState, FlagState)> = line
        .validated
        .findings
        .discrepancies
        .iter()
        .map(|found| {
            (
                found.shot_point,
                found.discrepancy.check,
                found.discrepancy.recorded,
                found.discrepancy.computed,
            )
        })
        .collect();
    assert_eq!(
        found,
        vec![(1001, CheckName::GunPressure, FlagState::Ok, FlagState::Error)]
    );
    assert!(line.validated.records[0].computed_flags.flag_discrepancy());
    assert!(!line.validated.records[1].computed_flags.flag_discrepancy());
    assert_eq!(line.summary.discrepancy_shots, 1);
}

#[test]
fn validating_twice_gives_the_same_flags() {
    let dir = TempDir::new().unwrap();
    let shots = timed_shots(1001, 12, &[2, 3, 4, 5, 6, 7, 8], 5);
    let report = run(&[primary_only(write_primary(dir.path(), "3184P3", &shots))]);
    let first = &report.lines[0].validated;

    let thresholds = ThresholdSet::default();
    let again = Validator::new(&thresholds)
        .validate(&first.line_id, first.records.clone())
        .unwrap();
    assert_eq!(again.records, first.records);
    assert_eq!(again.findings, first.findings);
}

#[test]
fn missing_dither_gets_a_suggestion_and_stays_unset() {
    let dir = TempDir::new().unwrap();
    let shots = vec![
        (4201, 0, Some(-110)),
        (4203, 8, Some(-58)),
        (4205, 16, None),
        (4207, 24, Some(11)),
    ];
    let primary = write_primary(dir.path(), "3184P3", &shots);
    let reference_path = dir.path().join("dither.txt");
    fs::write(&reference_path, "-0.110\n-0.058\n-0.023\n0.011\n0.073\n").unwrap();
    let reference = DitherReference::load(&reference_path).unwrap();

    let report = Pipeline::new(ThresholdSet::default(), MergePolicy::default())
        .with_dither_reference(Some(reference))
        .run(&[primary_only(primary)], &NeverCancel)
        .unwrap();
    let line = &report.lines[0];
    assert_eq!(
        line.validated.findings.dither,
        vec![DitherFinding::Missing {
            shot_point: 4205,
            suggestion: Some(DitherSuggestion {
                value: -23,
                uncertain: false
            })
        }]
    );
    let record = &line.validated.records[2];
    assert_eq!(record.dither, None);
    assert!(record.computed_flags.missing_data());
}

#[test]
fn cancellation_keeps_only_completed_lines() {
    let dir = TempDir::new().unwrap();
    let sources = vec![
        primary_only(write_primary(dir.path(), "L1", &timed_shots(1001, 3, &[], 8))),
        primary_only(write_primary(dir.path(), "L2", &timed_shots(1001, 3, &[], 8))),
    ];
    let polls = Cell::new(0);
    let cancel = || {
        polls.set(polls.get() + 1);
        polls.get() > 1
    };
    let report = Pipeline::new(ThresholdSet::default(), MergePolicy::default())
        .run(&sources, &cancel)
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.lines.len(), 1);
    assert_eq!(report.lines[0].validated.line_id, LineId::new("L1", Some(1885)));
}

#[test]
fn unreadable_secondary_file_is_reported_and_line_still_runs() {
    let dir = TempDir::new().unwrap();
    let primary = write_primary(dir.path(), "3184P3", &timed_shots(1001, 3, &[], 8));
    let gun_data = dir.path().join("broken.asc");
    fs::write(&gun_data, "a\nb\nc\nd\nSHOT VOLUME\n1 3040\n").unwrap();
    let report = run(&[LineSources {
        primary: Some(primary),
        gun_data: Some(gun_data),
        ..LineSources::default()
    }]);
    assert_eq!(report.lines.len(), 1);
    assert_eq!(report.file_errors.len(), 1);
    assert_eq!(report.metrics.files_failed, 1);
}
