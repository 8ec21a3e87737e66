use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::Opts;
use crate::utils::config::{TrialConsts, minutes_to_duration};

/// Bounded-duration HTTP load generator.
#[derive(Clone, Debug, Parser)]
#[command(name = "endurance")]
#[command(about = "Cycle a target list across worker threads for a fixed time and append hit/miss counts to a results file.")]
#[command(after_help = "Example: endurance --workers 2 --targets targets.txt")]
pub struct Cli {
    /// Newline-delimited list of target URLs. Required here or in the settings file.
    #[arg(long, short = 't', value_name = "FILE")]
    pub targets: Option<PathBuf>,

    /// Results file; one `<timestamp>: <hits>/<misses>` line is appended per flush. Default: ./results.txt
    #[arg(long, short = 'r', value_name = "FILE")]
    pub results: Option<PathBuf>,

    /// Number of request workers. Default: available parallelism.
    #[arg(long, short = 'w', visible_alias = "cpus", value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// Minutes to run the trial. Default: 1.
    #[arg(long, short = 'm', value_parser = clap::value_parser!(u64).range(1..=TrialConsts::MAX_MINUTES))]
    pub minutes: Option<u64>,

    /// Seconds to run the trial. Overrides --minutes.
    #[arg(long, short = 's', value_parser = clap::value_parser!(u64).range(1..))]
    pub seconds: Option<u64>,

    /// Sleep before each request, in microseconds.
    #[arg(long, value_name = "MICROS")]
    pub pacing_us: Option<u64>,

    /// How often each worker reports its counts, in milliseconds.
    #[arg(long, value_name = "MILLIS", value_parser = clap::value_parser!(u64).range(1..))]
    pub report_interval_ms: Option<u64>,

    /// How often totals are appended to the results file, in milliseconds.
    #[arg(long, value_name = "MILLIS", value_parser = clap::value_parser!(u64).range(1..))]
    pub flush_interval_ms: Option<u64>,

    /// Work queue capacity between the target dispenser and the workers.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub queue_capacity: Option<u64>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl Cli {
    /// Apply flags that were given on the command line over `opts` (defaults + settings file).
    pub fn apply_to_opts(&self, opts: &mut Opts) {
        if let Some(ref p) = self.targets {
            opts.targets_path = Some(p.clone());
        }
        if let Some(ref p) = self.results {
            opts.results_path = p.clone();
        }
        if let Some(n) = self.workers {
            opts.workers = n as usize;
        }
        if let Some(m) = self.minutes {
            opts.duration = minutes_to_duration(m);
        }
        if let Some(s) = self.seconds {
            opts.duration = Duration::from_secs(s);
        }
        if let Some(us) = self.pacing_us {
            opts.pacing = Duration::from_micros(us);
        }
        if let Some(ms) = self.report_interval_ms {
            opts.report_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.flush_interval_ms {
            opts.flush_interval = Duration::from_millis(ms);
        }
        if let Some(n) = self.queue_capacity {
            opts.queue_capacity = n as usize;
        }
        if let Some(v) = self.verbose {
            opts.verbose = v;
        }
    }
}
