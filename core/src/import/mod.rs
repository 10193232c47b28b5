//! One importer per file family. Each produces a [`crate::record::SourceTable`]
//! of per-shot field mappings; row problems are collected, never fatal.

pub mod channels;
pub mod dither;
pub mod fields;
pub mod fixed_width;
pub mod gun_data;
pub mod source_timing;
pub mod tabular;

pub use dither::DitherReference;
pub use fixed_width::PrimaryImporter;
pub use gun_data::GunDataImporter;
pub use source_timing::SourceTimingImporter;
pub use tabular::{ComparisonImporter, ReportImporter};
