//! Endurance: bounded-duration HTTP load generator.
//!
//! A dispenser cycles the target list into a bounded work queue until the deadline, a pool of
//! worker threads probes each target, and a single aggregator sums their batches and appends
//! totals to a sink on a fixed period.

pub mod engine;
pub mod pipeline;
pub mod trial;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use log::debug;
use std::sync::Arc;

use engine::{Prober, ResultSink};

/// Result alias used by public endurance API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: cycle `targets` across `opts.workers` workers for `opts.duration`, probing
/// each with `prober`, and write flushed totals to `sink`. Blocks until every worker has reported.
///
/// Rejects an empty target list or invalid options before starting any thread. A sink write
/// error ends the run with that error.
///
/// ```ignore
/// let opts = TrialOpts { workers: 2, duration: Duration::from_secs(2), ..Default::default() };
/// let prober = Arc::new(HttpProber::new()?);
/// let mut sink = FileSink::open(Path::new("results.txt"))?;
/// let summary = endurance::run_trial(targets, &opts, &mut sink, prober)?;
/// ```
pub fn run_trial(
    targets: Vec<String>,
    opts: &TrialOpts,
    sink: &mut dyn ResultSink,
    prober: Arc<dyn Prober>,
) -> Result<TrialSummary> {
    debug!(
        "{} CONFIG:{:#?}",
        utils::PackagePaths::get().pkg_name().to_uppercase(),
        opts
    );
    pipeline::execute_trial(targets, opts, sink, prober, None)
}
