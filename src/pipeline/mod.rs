//! Pipeline components: dispenser, request workers, aggregator, and the orchestrator wiring them.

pub mod aggregator;
pub mod context;
pub mod dispenser;
pub mod orchestrator;
pub mod worker;

pub use aggregator::{AggregateTotals, Aggregator, AggregatorPhase, run_aggregator};
pub use context::{PipelineChannels, PipelineHandles, create_pipeline_channels};
pub use dispenser::{DispenseStop, run_dispenser, spawn_dispenser};
pub use orchestrator::{execute_trial, run_pipeline, shutdown_pipeline_handles};
pub use worker::{WorkerTiming, run_worker, spawn_workers};
