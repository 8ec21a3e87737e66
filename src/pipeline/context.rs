//! Pipeline channels and the handles returned once every thread is spawned.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::thread::JoinHandle;

use crate::{ResultBatch, TrialOpts};

/// Channels for the pipeline. Dispenser gets `target_tx`; workers get `target_rx` and `batch_tx`;
/// the aggregator gets `batch_rx`.
pub struct PipelineChannels {
    pub target_tx: Sender<String>,
    pub target_rx: Receiver<String>,
    pub batch_tx: Sender<ResultBatch>,
    pub batch_rx: Receiver<ResultBatch>,
}

/// Work queue is bounded by `queue_capacity` (the only backpressure point).
/// The result channel is a rendezvous channel: a worker's send completes only when the aggregator takes it.
pub fn create_pipeline_channels(opts: &TrialOpts) -> PipelineChannels {
    let (target_tx, target_rx) = bounded::<String>(opts.queue_capacity);
    let (batch_tx, batch_rx) = bounded::<ResultBatch>(0);
    PipelineChannels {
        target_tx,
        target_rx,
        batch_tx,
        batch_rx,
    }
}

/// Handles for the producer side of a running pipeline. The aggregator runs on the caller's thread.
/// `dispenser_handle` yields the number of targets dispensed; each worker handle yields requests issued.
pub struct PipelineHandles {
    pub batch_rx: Receiver<ResultBatch>,
    pub dispenser_handle: JoinHandle<u64>,
    pub worker_handles: Vec<JoinHandle<u64>>,
}
