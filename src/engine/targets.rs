//! Target list loading: newline-delimited URLs, read once before the pipeline starts.

use anyhow::{Context, Result, bail};
use std::path::Path;

/// Parse a newline-delimited target list. Lines are trimmed; blank lines and `#` comments are skipped.
pub fn parse_targets(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read targets from `path`. An empty list is an error, since the dispenser has nothing to cycle.
pub fn load_targets(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read target list {}", path.display()))?;
    let targets = parse_targets(&contents);
    if targets.is_empty() {
        bail!("target list {} contains no targets", path.display());
    }
    log::debug!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}
