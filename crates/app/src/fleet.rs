//! Running several upload agents side by side.
//!
//! The file list is cut into contiguous slices, one per agent. Each agent
//! runs on its own thread with its own socket, identity, and RNG; agents
//! share nothing and only their counters are combined at the end.

use std::path::PathBuf;
use std::thread;

use anyhow::{anyhow, Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crawler_core::{SessionMetrics, UdpTransport, UploadSession};

use crate::config::Config;

/// Outcome of a whole crawl.
#[derive(Debug)]
pub struct FleetReport {
    /// Agents started
    pub agents: usize,
    /// Files handed to agents (before duplication)
    pub files: usize,
    /// Uploads that completed, duplicates included
    pub uploaded: usize,
    /// Counters of every agent combined
    pub metrics: SessionMetrics,
}

/// Split `files` into slices of `len / agents + 1`, keeping order.
///
/// Fewer slices than `agents` come back when there are few files.
pub fn partition(files: &[PathBuf], agents: usize) -> Vec<Vec<PathBuf>> {
    if files.is_empty() {
        return Vec::new();
    }
    let per_agent = files.len() / agents.max(1) + 1;
    files.chunks(per_agent).map(<[PathBuf]>::to_vec).collect()
}

/// RNG for agent `index`: derived from the seed when there is one.
pub fn agent_rng(seed: Option<u64>, index: usize) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(index as u64)),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Upload `files` with `config.agents` agents and wait for all of them.
pub fn run(config: &Config, files: &[PathBuf]) -> Result<FleetReport> {
    let slices = partition(files, config.agents);
    tracing::info!(
        "Crawling {} files with {} agents -> {}",
        files.len(),
        slices.len(),
        config.server
    );

    let mut handles = Vec::with_capacity(slices.len());
    for (index, slice) in slices.into_iter().enumerate() {
        let session_config = config.session.clone();
        let server = config.server.clone();
        let rng = agent_rng(config.seed, index);

        let handle = thread::Builder::new()
            .name(format!("crawler-{index}"))
            .spawn(move || -> Result<(usize, SessionMetrics)> {
                let timeout = session_config.receive_timeout;
                let transport = UdpTransport::connect(server.as_str(), timeout)
                    .with_context(|| format!("agent {index} cannot reach {server}"))?;
                let mut session = UploadSession::new(session_config, transport, rng);
                let uploaded = session.run(&slice);
                Ok((uploaded, session.into_metrics()))
            })
            .context("failed to spawn agent thread")?;
        handles.push(handle);
    }

    let mut report = FleetReport {
        agents: handles.len(),
        files: files.len(),
        uploaded: 0,
        metrics: SessionMetrics::new(),
    };

    for handle in handles {
        let (uploaded, metrics) = handle
            .join()
            .map_err(|_| anyhow!("agent thread panicked"))??;
        report.uploaded += uploaded;
        report.metrics.merge(&metrics);
    }
    report.metrics.complete();

    Ok(report)
}
