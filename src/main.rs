//! Endurance CLI: hammer a list of targets for a fixed time and record hit/miss counts.

use anyhow::Result;
use clap::Parser;
use endurance::engine::arg_parser::Cli;
use endurance::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
