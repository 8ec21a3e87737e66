//! Target dispenser: cycles the target list into the work queue until the deadline.

use crossbeam_channel::{SendTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Why the dispenser stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispenseStop {
    /// Deadline reached; the normal way out.
    Deadline,
    /// Every worker dropped its receiver, so nobody is left to take work.
    Disconnected,
}

/// Push targets round-robin into `target_tx` until `deadline`. Blocks while the queue is full;
/// a blocked push gives up at the deadline, so at most one push is in flight when time runs out.
/// Drops `target_tx` on return, which closes the queue once no other sender exists.
/// Returns the number of targets pushed and why it stopped. `targets` must be non-empty.
pub fn run_dispenser(
    targets: &[String],
    target_tx: Sender<String>,
    deadline: Instant,
) -> (u64, DispenseStop) {
    debug_assert!(!targets.is_empty(), "dispenser needs at least one target");
    let mut count = 0_u64;
    let stop = 'cycle: loop {
        for target in targets {
            match target_tx.send_deadline(target.clone(), deadline) {
                Ok(()) => count += 1,
                Err(SendTimeoutError::Timeout(_)) => break 'cycle DispenseStop::Deadline,
                Err(SendTimeoutError::Disconnected(_)) => break 'cycle DispenseStop::Disconnected,
            }
            if Instant::now() >= deadline {
                break 'cycle DispenseStop::Deadline;
            }
        }
    };
    drop(target_tx);
    (count, stop)
}

/// Spawn the dispenser thread. The deadline is measured from the moment of the call.
pub fn spawn_dispenser(
    targets: Arc<[String]>,
    target_tx: Sender<String>,
    duration: Duration,
) -> JoinHandle<u64> {
    let deadline = Instant::now() + duration;
    thread::spawn(move || {
        log::debug!("Dispenser started: {} targets", targets.len());
        let (count, stop) = run_dispenser(&targets, target_tx, deadline);
        match stop {
            DispenseStop::Deadline => {
                log::debug!("Dispenser closing work queue after {} targets", count)
            }
            DispenseStop::Disconnected => {
                log::warn!("All workers exited early; dispenser stopped after {} targets", count)
            }
        }
        count
    })
}
