pub mod log;
pub mod metrics;

pub use self::log::{LogManager, Stage};
pub use metrics::RunMetrics;
