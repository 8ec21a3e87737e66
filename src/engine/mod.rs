//! Engine module: CLI surface and the collaborators the pipeline talks to.

pub mod arg_parser;
pub mod cli;
pub mod probe;
pub mod progress;
pub mod sink;
pub mod targets;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use probe::{HttpProber, ProbeOutcome, Prober};
pub use sink::{FileSink, FlushRecord, ResultSink, TIMESTAMP_FORMAT, format_result_line};
pub use targets::{load_targets, parse_targets};
