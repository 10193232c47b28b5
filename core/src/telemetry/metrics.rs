use serde::Serialize;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunMetrics {
    pub lines_processed: usize,
    pub lines_failed: usize,
    pub files_failed: usize,
    pub rows_skipped: usize,
    pub records_validated: usize,
    pub records_with_errors: usize,
}

impl RunMetrics {
    pub fn record_line(&mut self, validated: usize, with_errors: usize) {
        self.lines_processed += 1;
        self.records_validated += validated;
        self.records_with_errors += with_errors;
    }

    pub fn record_failed_line(&mut self) {
        self.lines_failed += 1;
    }

    pub fn record_file_failure(&mut self) {
        self.files_failed += 1;
    }

    pub fn record_skipped_rows(&mut self, count: usize) {
        self.rows_skipped += count;
    }

    pub fn summary(&self) -> String {
        format!(
            "{} lines ({} failed), {} records validated, {} with errors, {} rows skipped, {} files unreadable",
            self.lines_processed,
            self.lines_failed,
            self.records_validated,
            self.records_with_errors,
            self.rows_skipped,
            self.files_failed
        )
    }
}
