//! Application configuration constants.
//! Pacing, intervals and capacities in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    settings_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                settings_filename: format!(".{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Name of the optional settings file looked up in the working directory.
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }
}

/// Results file used when neither the CLI nor the settings file names one.
pub const DEFAULT_RESULTS_PATH: &str = "./results.txt";

// ---- Worker threads ----

/// Worker count limits.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Minimum worker count.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Default worker count: one per available thread, never below the floor.
    pub fn default_workers(&self) -> usize {
        self.all_threads.max(self.floor)
    }
}

// ---- Trial timing ----

/// Timing and sizing defaults for a trial. Every value can be overridden by the settings file or CLI.
pub struct TrialConsts;

impl TrialConsts {
    /// Sleep before each request so a single worker never hammers a target back to back.
    pub const PACING: Duration = Duration::from_micros(500);
    /// How often a worker hands its local counts to the aggregator.
    pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);
    /// How often the aggregator appends a line to the results file.
    pub const FLUSH_INTERVAL: Duration = Duration::from_secs(10);
    /// Work queue capacity between the dispenser and the workers.
    pub const QUEUE_CAPACITY: usize = 1000;
    /// Run length when none is given.
    pub const DEFAULT_MINUTES: u64 = 1;
    /// Largest `minutes` value whose length in seconds fits a `u64`.
    pub const MAX_MINUTES: u64 = u64::MAX / 60;
}

/// Run length for `minutes`. Saturates on overflow; [`TrialOpts::validate`](crate::TrialOpts::validate)
/// then refuses the oversized duration.
pub fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.checked_mul(60).unwrap_or(u64::MAX))
}
