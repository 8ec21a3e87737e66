//! Trial runs from the CLI: load targets, open the results file, wire progress, run the pipeline.

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use crate::engine::progress::{create_counter, progress_callback, refresh_bar};
use crate::engine::{FileSink, HttpProber, Prober, load_targets};
use crate::pipeline::execute_trial;
use crate::utils::{Colors, cap_workers};
use crate::{Opts, TrialOpts, TrialSummary};

/// Run a full trial described by `opts`. Appends to `opts.results_path`; a write failure there
/// aborts the run with an error.
pub fn run_trial_from_opts(opts: &Opts) -> Result<TrialSummary> {
    let targets_path = opts
        .targets_path
        .as_deref()
        .context("no target list given")?;
    let targets = load_targets(targets_path)?;

    let mut trial = TrialOpts::from(opts);
    trial.validate()?;
    trial.workers = cap_workers(trial.workers);

    let mut sink = FileSink::open(&opts.results_path)?;
    let prober: Arc<dyn Prober> = Arc::new(HttpProber::new()?);

    info!(
        "Starting trial: {} targets, {} workers, {:?} -> {}",
        targets.len(),
        trial.workers,
        trial.duration,
        sink.path().display()
    );

    let bar = opts.verbose.then(|| {
        let b = create_counter("Requests");
        refresh_bar(&b);
        b
    });
    let on_batch = progress_callback(&bar);

    let summary = execute_trial(targets, &trial, &mut sink, prober, on_batch)?;
    if bar.is_some() {
        eprintln!();
    }

    info!(
        "Trial finished in {:.1?}: {} hits / {} misses over {} flushes ({} dispensed)",
        summary.elapsed,
        Colors::hits(summary.successes),
        Colors::misses(summary.failures),
        summary.flushes,
        summary.dispensed
    );
    Ok(summary)
}
