//! Multi-line batch: import, merge, validate and aggregate each line in turn,
//! polling a cancellation check between lines.

use crate::aggregate::{summarize, LineSummary, ProductionRange};
use crate::config::{MergePolicy, ThresholdSet};
use crate::import::{
    ComparisonImporter, DitherReference, GunDataImporter, PrimaryImporter, ReportImporter,
    SourceTimingImporter,
};
use crate::merge::{MergeIssue, Merger};
use crate::prelude::{
    CancelCheck, ImportError, PipelineResult, SourceImporter, ValidationError,
};
use crate::record::{ChannelId, FlagState, LineId, RowIssue, SourceKind, SourceTable};
use crate::telemetry::{LogManager, RunMetrics, Stage};
use crate::validate::{ValidatedLine, Validator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input files of one survey line. Absent paths are treated as empty sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSources {
    /// Line identity for rows that carry none; defaults to the primary file's.
    pub line: Option<LineId>,
    pub primary: Option<PathBuf>,
    pub comparison: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub gun_data: Option<PathBuf>,
    pub source_timing: Option<PathBuf>,
    /// Primary header line count; `None` skips leading `H` records.
    pub header_lines: Option<usize>,
    pub production_range: Option<ProductionRange>,
}

impl LineSources {
    fn label(&self) -> String {
        match (&self.line, &self.primary) {
            (Some(line), _) => line.to_string(),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => "<unnamed>".to_string(),
        }
    }
}

/// File that could not be imported; the line went ahead without it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDiagnostic {
    pub kind: SourceKind,
    pub stage: &'static str,
    pub message: String,
}

impl From<&ImportError> for FileDiagnostic {
    fn from(err: &ImportError) -> Self {
        Self {
            kind: err.kind(),
            stage: err.stage(),
            message: err.to_string(),
        }
    }
}

/// Row skipped or partially read by an importer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowDiagnostic {
    pub kind: SourceKind,
    pub path: Option<PathBuf>,
    pub issue: RowIssue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineOutcome {
    pub validated: ValidatedLine,
    pub summary: LineSummary,
    pub channels: Vec<ChannelId>,
    pub merge_issues: Vec<MergeIssue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineFailure {
    pub line: String,
    pub error: ValidationError,
}

/// Everything a run produced. Lines appear only once fully processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub lines: Vec<LineOutcome>,
    pub failures: Vec<LineFailure>,
    pub file_errors: Vec<FileDiagnostic>,
    pub row_issues: Vec<RowDiagnostic>,
    pub metrics: RunMetrics,
    pub cancelled: bool,
}

pub struct Pipeline {
    thresholds: ThresholdSet,
    policy: MergePolicy,
    dither_reference: Option<DitherReference>,
    logger: LogManager,
}

impl Pipeline {
    pub fn new(thresholds: ThresholdSet, policy: MergePolicy) -> Self {
        Self {
            thresholds,
            policy,
            dither_reference: None,
            logger: LogManager::new(Stage::Pipeline),
        }
    }

    pub fn with_dither_reference(mut self, reference: Option<DitherReference>) -> Self {
        self.dither_reference = reference;
        self
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    /// Processes `lines` in order. Only an invalid configuration is fatal;
    /// file and line failures are reported and the batch carries on.
    pub fn run(&self, lines: &[LineSources], cancel: &dyn CancelCheck) -> PipelineResult<BatchReport> {
        self.thresholds.validate()?;
        self.policy.validate()?;
        self.thresholds.log_summary();

        let mut report = BatchReport::default();
        for sources in lines {
            if cancel.is_cancelled() {
                self.logger.warn(&format!(
                    "cancelled after {} of {} lines",
                    report.metrics.lines_processed + report.metrics.lines_failed,
                    lines.len()
                ));
                report.cancelled = true;
                break;
            }
            self.run_line(sources, &mut report);
        }
        self.logger.record(&report.metrics.summary());
        Ok(report)
    }

    fn run_line(&self, sources: &LineSources, report: &mut BatchReport) {
        let label = sources.label();
        self.logger.record(&format!("processing line {}", label));
        let tables = self.import_all(sources, report);

        let merged = Merger::new(&self.policy).merge(sources.line.as_ref(), &tables);
        if merged.is_empty() {
            let line = sources
                .line
                .clone()
                .unwrap_or_else(|| LineId::new(label.clone(), None));
            self.fail(report, label, ValidationError::EmptyLine(line));
            return;
        }

        let validator = Validator::new(&self.thresholds)
            .with_dither_reference(self.dither_reference.as_ref());
        for line in merged {
            match validator.validate(&line.line_id, line.records) {
                Ok(validated) => {
                    let summary = summarize(&validated, &self.thresholds, sources.production_range);
                    let with_errors = validated
                        .records
                        .iter()
                        .filter(|record| record.computed_flags.worst() == FlagState::Error)
                        .count();
                    report.metrics.record_line(validated.records.len(), with_errors);
                    report.lines.push(LineOutcome {
                        validated,
                        summary,
                        channels: line.channels,
                        merge_issues: line.issues,
                    });
                }
                Err(err) => self.fail(report, line.line_id.to_string(), err),
            }
        }
    }

    fn import_all(&self, sources: &LineSources, report: &mut BatchReport) -> Vec<SourceTable> {
        let primary = PrimaryImporter::new(sources.header_lines);
        let importers: [(&dyn SourceImporter, Option<&Path>); 5] = [
            (&primary, sources.primary.as_deref()),
            (&ComparisonImporter, sources.comparison.as_deref()),
            (&ReportImporter, sources.report.as_deref()),
            (&GunDataImporter, sources.gun_data.as_deref()),
            (&SourceTimingImporter, sources.source_timing.as_deref()),
        ];

        let mut tables = Vec::with_capacity(importers.len());
        for (importer, path) in importers {
            match importer.import_optional(path) {
                Ok(table) => {
                    report.metrics.record_skipped_rows(table.issues.len());
                    report.row_issues.extend(table.issues.iter().map(|issue| RowDiagnostic {
                        kind: table.kind,
                        path: table.path.clone(),
                        issue: issue.clone(),
                    }));
                    tables.push(table);
                }
                Err(err) => {
                    self.logger.warn(&format!("{}; continuing without it", err));
                    report.metrics.record_file_failure();
                    report.file_errors.push(FileDiagnostic::from(&err));
                    tables.push(SourceTable::empty(importer.kind()));
                }
            }
        }
        tables
    }

    fn fail(&self, report: &mut BatchReport, line: String, error: ValidationError) {
        self.logger.warn(&format!("line {} failed: {}", line, error));
        report.metrics.record_failed_line();
        report.failures.push(LineFailure { line, error });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Band;
    use crate::prelude::{NeverCancel, PipelineError};

    #[test]
    fn invalid_thresholds_stop_the_run() {
        let mut thresholds = ThresholdSet::default();
        thresholds.sti = Band::range(10.0, 6.0);
        let pipeline = Pipeline::new(thresholds, MergePolicy::default());
        let err = pipeline.run(&[LineSources::default()], &NeverCancel).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn cancellation_before_first_line_yields_nothing() {
        let pipeline = Pipeline::new(ThresholdSet::default(), MergePolicy::default());
        let cancel = || true;
        let report = pipeline.run(&[LineSources::default()], &cancel).unwrap();
        assert!(report.cancelled);
        assert!(report.lines.is_empty());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn line_without_data_fails_and_batch_continues() {
        let pipeline = Pipeline::new(ThresholdSet::default(), MergePolicy::default());
        let sources = LineSources {
            line: Some(LineId::new("L9", None)),
            primary: Some(PathBuf::from("/not/here/L9.S01")),
            ..LineSources::default()
        };
        let report = pipeline
            .run(&[sources.clone(), sources], &NeverCancel)
            .unwrap();
        assert!(!report.cancelled);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.metrics.lines_failed, 2);
        assert_eq!(
            report.failures[0].error,
            ValidationError::EmptyLine(LineId::new("L9", None))
        );
    }
}
