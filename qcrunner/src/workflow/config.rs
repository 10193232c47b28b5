use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use navqccore::{LineSources, MergePolicy, SourceMode, ThresholdSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON report with per-line summaries and findings.
    pub report: Option<PathBuf>,
    /// Directory receiving one flattened CSV per line.
    pub export: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub thresholds: ThresholdSet,
    pub merge: MergePolicy,
    pub lines: Vec<LineSources>,
    pub dither_reference: Option<PathBuf>,
    pub output: OutputConfig,
    /// When set, the lines are generated instead of read from `lines`.
    pub synthetic: Option<GeneratorConfig>,
}

fn rebase(base: &Path, path: &mut Option<PathBuf>) {
    if let Some(current) = path {
        if current.is_relative() {
            *current = base.join(&*current);
        }
    }
}

impl WorkflowConfig {
    /// Reads a YAML workflow; relative paths are taken from the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let mut config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        if let Some(base) = path_ref.parent() {
            config.rebase_paths(base);
        }
        log::info!(
            "workflow {}: {} lines, {}-source array",
            path_ref.display(),
            config.lines.len(),
            config.thresholds.source_mode.source_count()
        );
        Ok(config)
    }

    pub fn from_args(lines: usize, shots: usize, seed: u64, triple: bool) -> Self {
        let mut thresholds = ThresholdSet::default();
        if triple {
            thresholds.source_mode = SourceMode::Triple;
        }
        Self {
            thresholds,
            synthetic: Some(GeneratorConfig {
                lines,
                shots,
                seed,
                triple,
                ..GeneratorConfig::default()
            }),
            ..Self::default()
        }
    }

    fn rebase_paths(&mut self, base: &Path) {
        for line in &mut self.lines {
            for path in [
                &mut line.primary,
                &mut line.comparison,
                &mut line.report,
                &mut line.gun_data,
                &mut line.source_timing,
            ] {
                rebase(base, path);
            }
        }
        rebase(base, &mut self.dither_reference);
        rebase(base, &mut self.output.report);
        rebase(base, &mut self.output.export);
    }
}
