//! Network collaborator: issue one request against a target and report hit or miss.

use anyhow::{Context, Result};

/// Outcome of a single request. Status codes are not inspected: a reachable server that answers
/// with 500 is still a hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Hit,
    Miss,
}

/// Issues requests for the workers. Shared by every worker, so implementations must be thread-safe.
pub trait Prober: Send + Sync {
    fn probe(&self, target: &str) -> ProbeOutcome;
}

/// Any `Fn(&str) -> bool` is a prober (`true` = hit).
impl<F> Prober for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn probe(&self, target: &str) -> ProbeOutcome {
        if self(target) {
            ProbeOutcome::Hit
        } else {
            ProbeOutcome::Miss
        }
    }
}

/// Blocking HTTP GET prober backed by a shared `reqwest` client (connection pool reused across workers).
#[derive(Clone)]
pub struct HttpProber {
    client: reqwest::blocking::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (custom timeouts, proxies, headers).
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Prober for HttpProber {
    fn probe(&self, target: &str) -> ProbeOutcome {
        match self.client.get(target).send() {
            Ok(_response) => ProbeOutcome::Hit,
            Err(err) => {
                log::trace!("request to {} failed: {}", target, err);
                ProbeOutcome::Miss
            }
        }
    }
}
