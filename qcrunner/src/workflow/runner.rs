use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use navqccore::import::DitherReference;
use navqccore::{BatchReport, CancelCheck, Pipeline};

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Runs every configured line as one blocking call, polling `cancel`
    /// between lines.
    pub fn execute(&self, cancel: &dyn CancelCheck) -> anyhow::Result<BatchReport> {
        let pipeline = Pipeline::new(self.config.thresholds.clone(), self.config.merge.clone())
            .with_dither_reference(self.dither_reference());
        let report = pipeline
            .run(&self.config.lines, cancel)
            .context("running QC pipeline")?;
        Ok(report)
    }

    /// An unusable reference only disables dither suggestions.
    fn dither_reference(&self) -> Option<DitherReference> {
        let path = self.config.dither_reference.as_ref()?;
        match DitherReference::load(path) {
            Ok(reference) => Some(reference),
            Err(err) => {
                log::warn!("{}; continuing without dither suggestions", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{write_survey, GeneratorConfig};
    use navqccore::prelude::NeverCancel;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn synthetic(dir: &TempDir, lines: usize) -> WorkflowConfig {
        let generator = GeneratorConfig {
            lines,
            shots: 60,
            seed: 3,
            ..GeneratorConfig::default()
        };
        WorkflowConfig {
            lines: write_survey(&generator, dir.path()).unwrap(),
            ..WorkflowConfig::default()
        }
    }

    #[test]
    fn runner_executes_synthetic_survey() {
        let dir = TempDir::new().unwrap();
        let runner = Runner::new(synthetic(&dir, 2));
        let report = runner.execute(&NeverCancel).unwrap();
        assert_eq!(report.lines.len(), 2);
        assert!(report.failures.is_empty());
        assert!(report.file_errors.is_empty());
        for line in &report.lines {
            assert_eq!(line.summary.shots, 60);
            assert_eq!(line.summary.orphaned, 0);
            assert!(!line.summary.ordering_violation);
        }
    }

    #[test]
    fn runner_tolerates_missing_dither_reference() {
        let dir = TempDir::new().unwrap();
        let mut config = synthetic(&dir, 1);
        config.dither_reference = Some(PathBuf::from("/not/here/dither.txt"));
        let report = Runner::new(config).execute(&NeverCancel).unwrap();
        assert_eq!(report.lines.len(), 1);
    }
}
