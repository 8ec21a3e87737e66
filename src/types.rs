//! Public and internal types for the endurance API and pipeline.

use anyhow::{Result, bail};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::utils::config::{DEFAULT_RESULTS_PATH, TrialConsts, WorkerThreadLimits};

/// Counts a single worker hands to the aggregator. Ownership moves on send.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResultBatch {
    /// Index of the worker that produced the batch (for logs only).
    pub worker: usize,
    /// Requests that completed without a transport error since the worker's previous batch.
    pub success: u32,
    /// Requests that failed at the transport level since the worker's previous batch.
    pub failure: u32,
    /// Last batch this worker will ever send.
    pub is_final: bool,
}

impl ResultBatch {
    pub fn requests(&self) -> u64 {
        u64::from(self.success) + u64::from(self.failure)
    }
}

/// What a finished trial did. Returned by [`run_trial`](crate::run_trial).
#[derive(Clone, Debug, Default)]
pub struct TrialSummary {
    /// Workers that ran (after FD capping).
    pub workers: usize,
    /// Targets pushed onto the work queue by the dispenser.
    pub dispensed: u64,
    /// Requests issued, summed over the workers' own tallies.
    pub issued: u64,
    /// Hits recorded by the aggregator over the whole run (sum of every flushed line).
    pub successes: u64,
    /// Misses recorded by the aggregator over the whole run.
    pub failures: u64,
    /// Lines written to the sink, drain flush included.
    pub flushes: usize,
    /// Wall time from pipeline start to aggregator exit.
    pub elapsed: Duration,
}

/// Lib-only options for [`run_trial`](crate::run_trial). Only the values the pipeline consumes.
#[derive(Clone, Debug)]
pub struct TrialOpts {
    /// Number of request workers.
    pub workers: usize,
    /// How long the dispenser keeps cycling targets.
    pub duration: Duration,
    /// Sleep before each request, per worker.
    pub pacing: Duration,
    /// Worker batch period.
    pub report_interval: Duration,
    /// Aggregator flush period.
    pub flush_interval: Duration,
    /// Work queue capacity.
    pub queue_capacity: usize,
}

impl Default for TrialOpts {
    fn default() -> Self {
        Self {
            workers: WorkerThreadLimits::current().default_workers(),
            duration: Duration::from_secs(TrialConsts::DEFAULT_MINUTES * 60),
            pacing: TrialConsts::PACING,
            report_interval: TrialConsts::REPORT_INTERVAL,
            flush_interval: TrialConsts::FLUSH_INTERVAL,
            queue_capacity: TrialConsts::QUEUE_CAPACITY,
        }
    }
}

impl TrialOpts {
    /// Reject values the pipeline cannot run with. Checked before any thread is spawned.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("worker count must be at least 1");
        }
        if self.duration.is_zero() {
            bail!("run duration must be positive");
        }
        if Instant::now().checked_add(self.duration).is_none() {
            bail!("run duration {:?} is too long", self.duration);
        }
        if self.report_interval.is_zero() {
            bail!("worker report interval must be positive");
        }
        if self.flush_interval.is_zero() {
            bail!("flush interval must be positive");
        }
        if Instant::now().checked_add(self.flush_interval).is_none() {
            bail!("flush interval {:?} is too long", self.flush_interval);
        }
        if self.queue_capacity == 0 {
            bail!("work queue capacity must be at least 1");
        }
        Ok(())
    }
}

impl From<&Opts> for TrialOpts {
    fn from(o: &Opts) -> Self {
        TrialOpts {
            workers: o.workers,
            duration: o.duration,
            pacing: o.pacing,
            report_interval: o.report_interval,
            flush_interval: o.flush_interval,
            queue_capacity: o.queue_capacity,
        }
    }
}

/// Full options (CLI and settings file). Use [`TrialOpts`] for lib.
#[derive(Clone, Debug)]
pub struct Opts {
    /// Newline-delimited target list. Required before a run starts.
    pub targets_path: Option<PathBuf>,
    /// Append-only results file.
    pub results_path: PathBuf,
    /// Number of request workers (before FD capping).
    pub workers: usize,
    /// Run length.
    pub duration: Duration,
    /// Sleep before each request.
    pub pacing: Duration,
    /// Worker batch period.
    pub report_interval: Duration,
    /// Aggregator flush period.
    pub flush_interval: Duration,
    /// Work queue capacity.
    pub queue_capacity: usize,
    /// Debug logging and a live request counter.
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        let trial = TrialOpts::default();
        Opts {
            targets_path: None,
            results_path: PathBuf::from(DEFAULT_RESULTS_PATH),
            workers: trial.workers,
            duration: trial.duration,
            pacing: trial.pacing,
            report_interval: trial.report_interval,
            flush_interval: trial.flush_interval,
            queue_capacity: trial.queue_capacity,
            verbose: false,
        }
    }
}
