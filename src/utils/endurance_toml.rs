//! Load `.endurance.toml` from a directory (CLI only). Lib callers pass [`TrialOpts`](crate::TrialOpts) directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Opts;
use crate::utils::config::{PackagePaths, minutes_to_duration};

#[derive(Debug, Default, Deserialize)]
pub struct EnduranceToml {
    #[serde(default)]
    settings: TrialSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TrialSection {
    targets: Option<String>,
    results: Option<String>,
    workers: Option<usize>,
    minutes: Option<u64>,
    seconds: Option<u64>,
    pacing_us: Option<u64>,
    report_interval_ms: Option<u64>,
    flush_interval_ms: Option<u64>,
    queue_capacity: Option<usize>,
    verbose: Option<bool>,
}

/// Parse settings file contents.
pub fn parse_settings(s: &str) -> Result<EnduranceToml> {
    toml::from_str(s).context("parse settings")
}

/// Load the settings file from `dir`. `Ok(None)` when there is no such file. CLI only.
pub fn load_settings_toml(dir: &Path) -> Result<Option<EnduranceToml>> {
    let path = dir.join(PackagePaths::get().settings_filename());
    let s = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    parse_settings(&s)
        .with_context(|| path.display().to_string())
        .map(Some)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident) => {
        if let Some(v) = $sec.$sec_field {
            $opts.$opts_field = v;
        }
    };
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident, $conv:expr) => {
        if let Some(v) = $sec.$sec_field {
            $opts.$opts_field = $conv(v);
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
/// `seconds` wins over `minutes` when both are set.
pub fn apply_file_to_opts(file: &EnduranceToml, opts: &mut Opts) {
    let sec = &file.settings;
    if let Some(ref p) = sec.targets {
        opts.targets_path = Some(PathBuf::from(p));
    }
    if let Some(ref p) = sec.results {
        opts.results_path = PathBuf::from(p);
    }
    apply_file_opt!(sec, opts, workers => workers);
    apply_file_opt!(sec, opts, minutes => duration, minutes_to_duration);
    apply_file_opt!(sec, opts, seconds => duration, Duration::from_secs);
    apply_file_opt!(sec, opts, pacing_us => pacing, Duration::from_micros);
    apply_file_opt!(sec, opts, report_interval_ms => report_interval, Duration::from_millis);
    apply_file_opt!(sec, opts, flush_interval_ms => flush_interval, Duration::from_millis);
    apply_file_opt!(sec, opts, queue_capacity => queue_capacity);
    apply_file_opt!(sec, opts, verbose => verbose);
}
