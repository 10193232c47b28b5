use crate::report::model::QcReport;
use crate::workflow::config::OutputConfig;
use anyhow::{Context, Result};
use navqccore::export::flatten;
use navqccore::pipeline::LineOutcome;
use navqccore::BatchReport;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Writes run results to the configured report and export locations.
pub struct ReportWriter {
    output: OutputConfig,
}

impl ReportWriter {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    pub fn publish(&self, batch: &BatchReport) -> Result<()> {
        if let Some(path) = &self.output.report {
            self.write_report(path, &QcReport::from(batch))?;
        }
        if let Some(dir) = &self.output.export {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating export directory {}", dir.display()))?;
            for line in &batch.lines {
                let path = export_path(dir, line);
                write_csv(&path, line)?;
                log::info!("exported line {} to {}", line.summary.line_id, path.display());
            }
        }
        Ok(())
    }

    pub fn publish_status(&self, batch: &BatchReport) {
        for line in &batch.lines {
            let summary = &line.summary;
            println!(
                "[QC] line {}: SP {}..{} {} shots, {:.2}% error shots, {} orphans -> {}",
                summary.line_id,
                summary.first_shot.map(|sp| sp.to_string()).unwrap_or_default(),
                summary.last_shot.map(|sp| sp.to_string()).unwrap_or_default(),
                summary.shots,
                summary.error_percent,
                summary.orphaned,
                if summary.compliant { "compliant" } else { "NOT compliant" }
            );
        }
        for failure in &batch.failures {
            println!("[QC] line {} failed: {}", failure.line, failure.error);
        }
        if batch.cancelled {
            println!("[QC] run cancelled; results cover completed lines only");
        }
    }

    fn write_report(&self, path: &Path, report: &QcReport) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .with_context(|| format!("creating report {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)
            .with_context(|| format!("writing report {}", path.display()))?;
        log::info!("report written to {}", path.display());
        Ok(())
    }
}

fn export_path(dir: &Path, line: &LineOutcome) -> PathBuf {
    let id = &line.validated.line_id;
    let name = match id.sequence {
        Some(sequence) => format!("{}_{}.csv", id.name, sequence),
        None => format!("{}.csv", id.name),
    };
    dir.join(name)
}

fn write_csv(path: &Path, line: &LineOutcome) -> Result<()> {
    let table = flatten(&line.validated, &line.channels);
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating export {}", path.display()))?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("writing export {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{write_survey, GeneratorConfig};
    use crate::workflow::config::WorkflowConfig;
    use crate::workflow::runner::Runner;
    use navqccore::prelude::NeverCancel;
    use tempfile::TempDir;

    #[test]
    fn publish_writes_report_and_one_csv_per_line() {
        let dir = TempDir::new().unwrap();
        let generator = GeneratorConfig {
            lines: 2,
            shots: 30,
            ..GeneratorConfig::default()
        };
        let config = WorkflowConfig {
            lines: write_survey(&generator, &dir.path().join("survey")).unwrap(),
            ..WorkflowConfig::default()
        };
        let batch = Runner::new(config).execute(&NeverCancel).unwrap();

        let output = OutputConfig {
            report: Some(dir.path().join("out/report.json")),
            export: Some(dir.path().join("out/csv")),
        };
        ReportWriter::new(output).publish(&batch).unwrap();

        let json: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("out/report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["lines"].as_array().unwrap().len(), 2);
        assert_eq!(json["cancelled"], false);

        let mut reader = csv::Reader::from_path(dir.path().join("out/csv/SYN001_1000.csv")).unwrap();
        assert!(reader.headers().unwrap().iter().any(|header| header == "flag_sti"));
        assert_eq!(reader.records().count(), 30);
    }
}
