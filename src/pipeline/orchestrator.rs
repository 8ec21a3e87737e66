use anyhow::{Result, bail};
use log::debug;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::engine::probe::Prober;
use crate::engine::sink::ResultSink;
use crate::pipeline;
use crate::pipeline::worker::WorkerTiming;
use crate::{TrialOpts, TrialSummary};

/// Start the dispenser and worker threads. Returns the batch receiver and handles; the caller runs
/// the aggregator on `batch_rx` and must join the handles when it returns.
pub fn run_pipeline(
    targets: Arc<[String]>,
    opts: &TrialOpts,
    prober: Arc<dyn Prober>,
) -> pipeline::PipelineHandles {
    let channels = pipeline::create_pipeline_channels(opts);

    let dispenser_handle =
        pipeline::spawn_dispenser(targets, channels.target_tx, opts.duration);

    let worker_handles = pipeline::spawn_workers(
        channels.target_rx,
        &channels.batch_tx,
        prober,
        opts.workers,
        WorkerTiming {
            pacing: opts.pacing,
            report_interval: opts.report_interval,
        },
    );

    // Dropping the last sender lets the aggregator see a disconnect if every worker dies unreported.
    drop(channels.batch_tx);

    pipeline::PipelineHandles {
        batch_rx: channels.batch_rx,
        dispenser_handle,
        worker_handles,
    }
}

/// Join the dispenser and workers. Returns `(dispensed, issued)`.
pub fn shutdown_pipeline_handles(
    dispenser_handle: JoinHandle<u64>,
    worker_handles: Vec<JoinHandle<u64>>,
) -> Result<(u64, u64)> {
    let mut panicked = 0_usize;
    let mut issued = 0_u64;
    for h in worker_handles {
        match h.join() {
            Ok(n) => issued += n,
            Err(_) => panicked += 1,
        }
    }
    let dispensed = dispenser_handle
        .join()
        .map_err(|_| anyhow::anyhow!("dispenser thread panicked"))?;
    if panicked > 0 {
        bail!("{} worker thread(s) panicked", panicked);
    }
    Ok((dispensed, issued))
}

/// Main orchestrator: dispenser → work queue → workers → result channel → aggregator → sink.
/// The aggregator runs on the calling thread. Validates options and the target list first; nothing
/// is spawned on a precondition failure.
pub fn execute_trial(
    targets: Vec<String>,
    opts: &TrialOpts,
    sink: &mut dyn ResultSink,
    prober: Arc<dyn Prober>,
    on_batch: Option<Box<dyn Fn(usize) + Send>>,
) -> Result<TrialSummary> {
    opts.validate()?;
    if targets.is_empty() {
        bail!("target list is empty");
    }

    let start = Instant::now();
    let pipeline::PipelineHandles {
        batch_rx,
        dispenser_handle,
        worker_handles,
    } = run_pipeline(targets.into(), opts, prober);

    let aggregated =
        pipeline::run_aggregator(batch_rx, sink, opts.workers, opts.flush_interval, on_batch);
    let elapsed = start.elapsed();

    // On aggregator failure the batch receiver is already dropped: workers fail their next send
    // and exit, the queue's receivers go with them, and the dispenser stops on disconnect.
    let joined = shutdown_pipeline_handles(dispenser_handle, worker_handles);
    let totals = aggregated?;
    let (dispensed, issued) = joined?;
    debug!(
        "Pipeline done: dispensed {}, issued {}, flushes {}",
        dispensed, issued, totals.flushes
    );

    Ok(TrialSummary {
        workers: opts.workers,
        dispensed,
        issued,
        successes: totals.successes,
        failures: totals.failures,
        flushes: totals.flushes,
        elapsed,
    })
}
