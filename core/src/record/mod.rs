pub mod flags;
pub mod shot;
pub mod source;

pub use flags::{CheckName, FlagDiscrepancy, FlagSet, FlagState, Missing};
pub use shot::{
    AdvisoryValue, ChannelId, ChannelReading, LineId, Measurement, Position, ShotRecord,
    SubArrayGeometry, SubArrayPosition,
};
pub use source::{
    Field, FieldGroup, FieldValue, RowIssue, RowIssueKind, SourceKind, SourceRow, SourceTable,
};
