use navqccore::pipeline::{FileDiagnostic, RowDiagnostic};
use navqccore::telemetry::RunMetrics;
use navqccore::validate::LineFindings;
use navqccore::{BatchReport, LineSummary};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct LineReport {
    pub summary: LineSummary,
    pub findings: LineFindings,
    pub merge_issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub line: String,
    pub error: String,
}

/// Serialisable view of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct QcReport {
    pub generated_at: String,
    pub cancelled: bool,
    pub metrics: RunMetrics,
    pub lines: Vec<LineReport>,
    pub failures: Vec<FailureReport>,
    pub file_errors: Vec<FileDiagnostic>,
    pub row_issues: Vec<RowDiagnostic>,
}

impl From<&BatchReport> for QcReport {
    fn from(batch: &BatchReport) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            cancelled: batch.cancelled,
            metrics: batch.metrics,
            lines: batch
                .lines
                .iter()
                .map(|line| LineReport {
                    summary: line.summary.clone(),
                    findings: line.validated.findings.clone(),
                    merge_issues: line.merge_issues.iter().map(ToString::to_string).collect(),
                })
                .collect(),
            failures: batch
                .failures
                .iter()
                .map(|failure| FailureReport {
                    line: failure.line.clone(),
                    error: failure.error.to_string(),
                })
                .collect(),
            file_errors: batch.file_errors.clone(),
            row_issues: batch.row_issues.clone(),
        }
    }
}
