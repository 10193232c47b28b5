pub mod policy;
pub mod thresholds;

pub use policy::MergePolicy;
pub use thresholds::{
    Band, ConsecutiveRules, CosRules, DepthRules, SeparationRules, SourceMode, ThresholdSet,
    WindowRule,
};
