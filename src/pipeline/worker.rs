//! Request workers: take targets off the work queue, probe them, report counts in batches.

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::ResultBatch;
use crate::engine::probe::{ProbeOutcome, Prober};

/// Per-worker timing, copied out of [`TrialOpts`](crate::TrialOpts).
#[derive(Clone, Copy, Debug)]
pub struct WorkerTiming {
    pub pacing: Duration,
    pub report_interval: Duration,
}

/// Local hit/miss tally between two batches.
#[derive(Default)]
struct Tally {
    success: u32,
    failure: u32,
}

impl Tally {
    fn record(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Hit => self.success += 1,
            ProbeOutcome::Miss => self.failure += 1,
        }
    }

    /// True when another increment could overflow a counter.
    fn saturated(&self) -> bool {
        self.success == u32::MAX || self.failure == u32::MAX
    }

    /// True when a non-final batch should go out now.
    fn due(&self, last_report: Instant, report_interval: Duration) -> bool {
        last_report.elapsed() >= report_interval || self.saturated()
    }

    /// Move the counts into a batch and reset to zero.
    fn take(&mut self, worker: usize, is_final: bool) -> ResultBatch {
        let t = std::mem::take(self);
        ResultBatch {
            worker,
            success: t.success,
            failure: t.failure,
            is_final,
        }
    }
}

/// Single worker loop. Runs until the work queue is closed and empty, then sends exactly one final
/// batch. Returns early, without a final batch, if the aggregator has gone away.
/// Returns the number of requests issued.
pub fn run_worker(
    worker: usize,
    target_rx: Receiver<String>,
    batch_tx: Sender<ResultBatch>,
    prober: &dyn Prober,
    timing: WorkerTiming,
) -> u64 {
    let mut tally = Tally::default();
    let mut issued = 0_u64;
    let mut last_report = Instant::now();

    while let Ok(target) = target_rx.recv() {
        if !timing.pacing.is_zero() {
            thread::sleep(timing.pacing);
        }
        tally.record(prober.probe(&target));
        issued += 1;

        if tally.due(last_report, timing.report_interval) {
            if batch_tx.send(tally.take(worker, false)).is_err() {
                log::debug!("Worker {}: aggregator gone, stopping", worker);
                return issued;
            }
            last_report = Instant::now();
        }
    }

    if batch_tx.send(tally.take(worker, true)).is_err() {
        log::debug!("Worker {}: aggregator gone before final batch", worker);
    }
    issued
}

/// Spawn `num_workers` workers sharing `target_rx` and `prober`. Caller must drop its own
/// `batch_tx` after this so the result channel disconnects once every worker is done.
pub fn spawn_workers(
    target_rx: Receiver<String>,
    batch_tx: &Sender<ResultBatch>,
    prober: Arc<dyn Prober>,
    num_workers: usize,
    timing: WorkerTiming,
) -> Vec<JoinHandle<u64>> {
    (0..num_workers)
        .map(|worker| {
            let target_rx = target_rx.clone();
            let batch_tx = batch_tx.clone();
            let prober = Arc::clone(&prober);
            thread::spawn(move || {
                log::debug!("Worker {} started", worker);
                let issued = run_worker(worker, target_rx, batch_tx, prober.as_ref(), timing);
                log::debug!("Worker {} finished after {} requests", worker, issued);
                issued
            })
        })
        .collect()
}
