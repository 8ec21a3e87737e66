//! Result aggregator: the single consumer of worker batches and the only writer of the results sink.
//!
//! Shutdown is by counting, not by channel closure: every worker tags its last batch, and the
//! aggregator stops after it has seen one final batch per worker.

use anyhow::{Result, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::ResultBatch;
use crate::engine::sink::{FlushRecord, ResultSink};

/// Aggregator lifecycle. Moves forward only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregatorPhase {
    /// Some workers have not sent their final batch yet.
    Running,
    /// Every worker has reported; the drain flush is pending.
    Draining,
    /// Drain flush written; nothing more is consumed.
    Terminated,
}

/// Totals over the whole run, returned when the aggregator exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateTotals {
    pub successes: u64,
    pub failures: u64,
    pub flushes: usize,
}

/// Aggregate state. Owned by the aggregator thread; nothing else touches it.
#[derive(Debug)]
pub struct Aggregator {
    window_success: u64,
    window_failure: u64,
    totals: AggregateTotals,
    workers_remaining: usize,
    phase: AggregatorPhase,
}

impl Aggregator {
    pub fn new(workers: usize) -> Self {
        Self {
            window_success: 0,
            window_failure: 0,
            totals: AggregateTotals::default(),
            workers_remaining: workers,
            phase: if workers == 0 {
                AggregatorPhase::Draining
            } else {
                AggregatorPhase::Running
            },
        }
    }

    pub fn phase(&self) -> AggregatorPhase {
        self.phase
    }

    pub fn workers_remaining(&self) -> usize {
        self.workers_remaining
    }

    /// Counts accumulated since the last flush: `(success, failure)`.
    pub fn window(&self) -> (u64, u64) {
        (self.window_success, self.window_failure)
    }

    pub fn totals(&self) -> AggregateTotals {
        self.totals
    }

    /// Add a batch into the running totals. A final batch counts one worker down; the last one
    /// moves the aggregator to [`AggregatorPhase::Draining`].
    pub fn absorb(&mut self, batch: &ResultBatch) -> Result<()> {
        if self.phase != AggregatorPhase::Running {
            bail!(
                "batch from worker {} arrived after every worker had finished",
                batch.worker
            );
        }
        self.window_success += u64::from(batch.success);
        self.window_failure += u64::from(batch.failure);
        self.totals.successes += u64::from(batch.success);
        self.totals.failures += u64::from(batch.failure);
        if batch.is_final {
            self.workers_remaining -= 1;
            log::debug!(
                "Worker {} done, {} remaining",
                batch.worker,
                self.workers_remaining
            );
            if self.workers_remaining == 0 {
                self.phase = AggregatorPhase::Draining;
            }
        }
        Ok(())
    }

    /// Write the current window to `sink` and reset it. `drain` marks the final flush and
    /// terminates the aggregator. A sink error is returned untouched; the window is kept.
    pub fn flush(&mut self, sink: &mut dyn ResultSink, drain: bool) -> Result<FlushRecord> {
        let record = FlushRecord::now(self.window_success, self.window_failure, drain);
        if let Err(err) = sink.write_flush(&record) {
            log::error!("Failed to write results: {:#}", err);
            return Err(err);
        }
        log::debug!(
            "Flushed {}/{}{}",
            record.success,
            record.failure,
            if drain { " (drain)" } else { "" }
        );
        self.window_success = 0;
        self.window_failure = 0;
        self.totals.flushes += 1;
        if drain {
            self.phase = AggregatorPhase::Terminated;
        }
        Ok(record)
    }
}

/// Consume batches from `batch_rx` until `workers` final batches have arrived, flushing to `sink`
/// every `flush_interval` whether or not batches are arriving. Ends with one unconditional drain flush.
///
/// Errors: a sink write failure (fatal, totals must not be lost silently), or the result channel
/// disconnecting while workers are still outstanding (a worker died without reporting). In the
/// latter case the drain flush is still written first.
pub fn run_aggregator(
    batch_rx: Receiver<ResultBatch>,
    sink: &mut dyn ResultSink,
    workers: usize,
    flush_interval: Duration,
    on_batch: Option<Box<dyn Fn(usize) + Send>>,
) -> Result<AggregateTotals> {
    let mut agg = Aggregator::new(workers);
    let mut next_flush = Instant::now() + flush_interval;
    log::debug!("Aggregator started: waiting on {} workers", workers);

    while agg.phase() == AggregatorPhase::Running {
        let wait = next_flush.saturating_duration_since(Instant::now());
        match batch_rx.recv_timeout(wait) {
            Ok(batch) => {
                if let Some(ref cb) = on_batch {
                    cb(usize::try_from(batch.requests()).unwrap_or(usize::MAX));
                }
                agg.absorb(&batch)?;
                if agg.phase() == AggregatorPhase::Running && Instant::now() >= next_flush {
                    agg.flush(sink, false)?;
                    next_flush = Instant::now() + flush_interval;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                agg.flush(sink, false)?;
                next_flush = Instant::now() + flush_interval;
            }
            Err(RecvTimeoutError::Disconnected) => {
                let missing = agg.workers_remaining();
                agg.flush(sink, true)?;
                bail!(
                    "result channel closed with {} of {} workers unreported",
                    missing,
                    workers
                );
            }
        }
    }

    agg.flush(sink, true)?;
    log::debug!("Aggregator finished after {} flushes", agg.totals().flushes);
    Ok(agg.totals())
}
