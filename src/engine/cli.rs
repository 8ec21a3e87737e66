//! CLI command handler: layer defaults, settings file and flags, then run the trial.

use anyhow::Result;
use clap::CommandFactory;
use clap::error::ErrorKind;
use log::warn;
use std::path::Path;

use crate::Opts;
use crate::engine::arg_parser::Cli;
use crate::trial::run_trial_from_opts;
use crate::utils::{apply_file_to_opts, load_settings_toml, setup_logging};

/// Defaults, then `.endurance.toml` from the working directory, then flags.
fn setup_opts(cli: &Cli) -> Opts {
    let mut opts = Opts::default();
    let file = load_settings_toml(Path::new("."));
    if let Ok(Some(ref file)) = file {
        apply_file_to_opts(file, &mut opts);
    }
    cli.apply_to_opts(&mut opts);
    setup_logging(opts.verbose);
    if let Err(e) = file {
        warn!("Ignoring settings file: {:#}", e);
    }
    opts
}

/// Run a trial with the layered options. Exits with a usage error when no target list is known.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);
    if opts.targets_path.is_none() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a target list is required: --targets <FILE> (or `targets` in the settings file)",
            )
            .exit();
    }
    run_trial_from_opts(&opts)?;
    Ok(())
}
