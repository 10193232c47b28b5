//! Quality control for marine seismic navigation and source records.
//!
//! Importers turn each survey file family into per-shot rows, the merger
//! joins them on shot point, and the validator flags every record against a
//! configurable threshold set. The pipeline runs that chain per line with
//! cooperative cancellation.

pub mod aggregate;
pub mod config;
pub mod export;
pub mod import;
pub mod math;
pub mod merge;
pub mod pipeline;
pub mod prelude;
pub mod record;
pub mod telemetry;
pub mod validate;

pub use aggregate::{LineSummary, ProductionRange};
pub use config::{MergePolicy, SourceMode, ThresholdSet};
pub use pipeline::{BatchReport, LineSources, Pipeline};
pub use prelude::{CancelCheck, SourceImporter};
pub use record::{CheckName, FlagState, LineId, ShotRecord};
pub use validate::{ValidatedLine, Validator};
