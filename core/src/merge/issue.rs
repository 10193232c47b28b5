use crate::record::{Field, FieldValue, LineId, SourceKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum MergeIssueKind {
    /// No primary row backs the key; the record is kept.
    Orphaned { sources: Vec<SourceKind> },
    /// Two sources disagree on a field; `kept` won on priority.
    FieldCollision {
        field: Field,
        kept: SourceKind,
        kept_value: FieldValue,
        dropped: SourceKind,
        dropped_value: FieldValue,
    },
    /// The same source reported the key twice; the later row is ignored.
    DuplicateKey { source: SourceKind, row_number: usize },
    /// Every source row for the key was empty; the record is dropped.
    EmptyRecord,
}

/// Merge inconsistency. Never fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeIssue {
    pub line: LineId,
    pub shot_point: i64,
    pub kind: MergeIssueKind,
}

impl fmt::Display for MergeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} SP {}: ", self.line, self.shot_point)?;
        match &self.kind {
            MergeIssueKind::Orphaned { sources } => {
                let names: Vec<&str> = sources.iter().map(|source| source.label()).collect();
                write!(f, "orphaned, only in {}", names.join(", "))
            }
            MergeIssueKind::FieldCollision {
                field,
                kept,
                kept_value,
                dropped,
                dropped_value,
            } => write!(
                f,
                "{} differs: {} '{}' kept over {} '{}'",
                field, kept, kept_value, dropped, dropped_value
            ),
            MergeIssueKind::DuplicateKey { source, row_number } => {
                write!(f, "duplicate {} row {} ignored", source, row_number)
            }
            MergeIssueKind::EmptyRecord => f.write_str("no data from any source, dropped"),
        }
    }
}
