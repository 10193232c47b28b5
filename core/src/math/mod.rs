pub mod geometry;
pub mod stats;

pub use geometry::GeometryHelper;
pub use stats::StatsHelper;
