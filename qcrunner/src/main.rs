use anyhow::{bail, Context};
use clap::Parser;
use generator::profile::write_survey;
use report::writer::ReportWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod report;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Batch QC of seismic navigation and source records")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Generate a synthetic survey and run QC on it
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    #[arg(long, default_value_t = 2)]
    lines: usize,
    #[arg(long, default_value_t = 200)]
    shots: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Triple-source array instead of dual
    #[arg(long, default_value_t = false)]
    triple: bool,
    /// Directory for synthetic survey files
    #[arg(long, default_value = "target/synthetic")]
    workdir: PathBuf,
    /// Directory for flattened per-line CSV files
    #[arg(long)]
    export: Option<PathBuf>,
    /// Path of the JSON run report
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = match (&args.workflow, args.synthetic) {
        (Some(path), _) => WorkflowConfig::load(path)?,
        (None, true) => WorkflowConfig::from_args(args.lines, args.shots, args.seed, args.triple),
        (None, false) => bail!("nothing to do: pass --workflow <yaml> or --synthetic"),
    };
    if args.export.is_some() {
        workflow_config.output.export = args.export.clone();
    }
    if args.report.is_some() {
        workflow_config.output.report = args.report.clone();
    }
    if let Some(generator) = &workflow_config.synthetic {
        workflow_config.lines = write_survey(generator, &args.workdir)
            .context("generating synthetic survey")?;
    }

    let writer = ReportWriter::new(workflow_config.output.clone());
    let runner = Runner::new(workflow_config);
    let cancelled = Arc::new(AtomicBool::new(false));

    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    let batch = runtime.block_on(async {
        let flag = cancelled.clone();
        let mut worker = tokio::task::spawn_blocking(move || {
            let cancel = move || flag.load(Ordering::SeqCst);
            runner.execute(&cancel)
        });
        let report = tokio::select! {
            finished = &mut worker => finished.context("QC worker panicked")??,
            interrupt = signal::ctrl_c() => {
                interrupt.context("awaiting Ctrl+C")?;
                log::warn!("Ctrl+C received, stopping after the current line");
                cancelled.store(true, Ordering::SeqCst);
                worker.await.context("QC worker panicked")??
            }
        };
        Ok::<_, anyhow::Error>(report)
    })?;

    log::info!("{}", batch.metrics.summary());
    writer.publish_status(&batch);
    writer.publish(&batch)?;
    Ok(())
}
