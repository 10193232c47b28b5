use crate::record::{LineId, SourceKind, SourceTable};
use log::debug;
use std::path::Path;

/// File-level import failure. Row-level problems are collected as
/// [`crate::record::RowIssue`] instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("{kind} file {path}: unreadable: {reason}")]
    Unreadable {
        kind: SourceKind,
        path: String,
        reason: String,
    },
    #[error("{kind} file {path}: missing required column `{column}`")]
    MissingColumn {
        kind: SourceKind,
        path: String,
        column: String,
    },
    #[error("{kind} file {path}: malformed header: {reason}")]
    MalformedHeader {
        kind: SourceKind,
        path: String,
        reason: String,
    },
}

impl ImportError {
    pub fn unreadable(kind: SourceKind, path: &Path, reason: impl ToString) -> Self {
        ImportError::Unreadable {
            kind,
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_column(kind: SourceKind, path: &Path, column: impl Into<String>) -> Self {
        ImportError::MissingColumn {
            kind,
            path: path.display().to_string(),
            column: column.into(),
        }
    }

    pub fn malformed_header(kind: SourceKind, path: &Path, reason: impl Into<String>) -> Self {
        ImportError::MalformedHeader {
            kind,
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Parse stage the failure happened in.
    pub fn stage(&self) -> &'static str {
        match self {
            ImportError::Unreadable { .. } => "open",
            ImportError::MissingColumn { .. } | ImportError::MalformedHeader { .. } => "header",
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            ImportError::Unreadable { kind, .. }
            | ImportError::MissingColumn { kind, .. }
            | ImportError::MalformedHeader { kind, .. } => *kind,
        }
    }
}

/// Dither reference file could not be used.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("dither reference {path}: unreadable: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("dither reference {path}: row {row_number}: cannot parse '{value}'")]
    Malformed {
        path: String,
        row_number: usize,
        value: String,
    },
    #[error("dither reference {path}: no values")]
    Empty { path: String },
}

/// Invalid or incomplete rule set; fatal to the whole run.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("threshold band for {name} is invalid: {reason}")]
    InvalidBand { name: String, reason: String },
    #[error("consecutive-error window {size}/{limit} is invalid: {reason}")]
    InvalidWindow {
        size: usize,
        limit: usize,
        reason: String,
    },
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("unknown source mode `{0}` (expected dual or triple)")]
    UnknownSourceMode(String),
}

/// Failure that invalidates a single line's validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("line {line}: consecutive-error window {size} state corrupt: {detail}")]
    WindowState {
        line: LineId,
        size: usize,
        detail: String,
    },
    #[error("line {0}: no records to validate")]
    EmptyLine(LineId),
}

/// Errors that stop a pipeline run before any file is processed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type ImportResult<T> = Result<T, ImportError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type PipelineResult<T> = Result<T, PipelineError>;

/// One file family's parser.
pub trait SourceImporter {
    fn kind(&self) -> SourceKind;

    fn import(&self, path: &Path) -> ImportResult<SourceTable>;

    /// Optional files: no path, or a path that does not exist, yields an empty table.
    fn import_optional(&self, path: Option<&Path>) -> ImportResult<SourceTable> {
        match path {
            Some(path) if path.exists() => self.import(path),
            Some(path) => {
                debug!("{} file {} not present, skipping", self.kind(), path.display());
                Ok(SourceTable::empty(self.kind()))
            }
            None => Ok(SourceTable::empty(self.kind())),
        }
    }
}

/// Cooperative cancellation, polled between lines.
pub trait CancelCheck {
    fn is_cancelled(&self) -> bool;
}

impl<F> CancelCheck for F
where
    F: Fn() -> bool,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Cancellation source that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelCheck for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct EmptyImporter;

    impl SourceImporter for EmptyImporter {
        fn kind(&self) -> SourceKind {
            SourceKind::Report
        }

        fn import(&self, path: &Path) -> ImportResult<SourceTable> {
            Err(ImportError::unreadable(self.kind(), path, "should not be called"))
        }
    }

    #[test]
    fn optional_import_tolerates_absent_files() {
        let importer = EmptyImporter;
        let table = importer.import_optional(None).unwrap();
        assert!(table.is_empty());
        let absent = PathBuf::from("/definitely/not/here.csv");
        let table = importer.import_optional(Some(&absent)).unwrap();
        assert_eq!(table.kind, SourceKind::Report);
    }

    #[test]
    fn import_error_reports_stage() {
        let err = ImportError::missing_column(SourceKind::Comparison, Path::new("a.csv"), "Shot");
        assert_eq!(err.stage(), "header");
        assert!(err.to_string().contains("`Shot`"));
    }

    #[test]
    fn closures_act_as_cancel_checks() {
        let check = || true;
        assert!(check.is_cancelled());
        assert!(!NeverCancel.is_cancelled());
    }
}
