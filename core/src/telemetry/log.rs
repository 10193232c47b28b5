use log::{debug, info, warn};
use std::fmt;

/// Pipeline stage a log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Import,
    Merge,
    Validate,
    Aggregate,
    Pipeline,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Import => "import",
            Stage::Merge => "merge",
            Stage::Validate => "validate",
            Stage::Aggregate => "aggregate",
            Stage::Pipeline => "pipeline",
        })
    }
}

pub struct LogManager {
    stage: Stage,
}

impl LogManager {
    pub fn new(stage: Stage) -> Self {
        Self { stage }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.stage, message);
    }

    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.stage, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.stage, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new(Stage::Pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tags_are_lowercase() {
        assert_eq!(Stage::Validate.to_string(), "validate");
        assert_eq!(LogManager::default().stage(), Stage::Pipeline);
    }
}
