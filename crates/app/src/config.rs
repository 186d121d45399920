//! Configuration for the crawler application.
//!
//! Everything that tunes an upload comes from `CRWL_*` environment
//! variables, read once at startup into a [`Config`]. The crawler works with
//! none of them set.
//!
//! # Philosophy
//!
//! Overrides are test knobs, so a bad value must never stop a run: a
//! malformed number silently falls back to its default. Flags count as set
//! when the variable is present and non-empty.

use std::str::FromStr;
use std::time::Duration;

use crawler_core::SessionConfig;

/// Receiver address when `CRWL_SERVER` is unset.
pub const DEFAULT_SERVER: &str = "127.0.0.1:7331";

/// Agents when `CRWL_NB_CRAWLERS` is unset or unusable.
pub const DEFAULT_AGENTS: usize = 2;

/// Complete configuration for a crawl.
#[derive(Debug, Clone)]
pub struct Config {
    // === Receiver ===
    /// Address of the upload receiver
    pub server: String,

    // === Agents ===
    /// Number of agents the file list is split across
    pub agents: usize,

    /// Seed for agent identities and fault dice (None = OS entropy)
    pub seed: Option<u64>,

    // === Session ===
    /// Per-agent upload settings
    pub session: SessionConfig,

    // === Behavior ===
    /// Verbose logging when `RUST_LOG` is not set
    pub debug: bool,
}

impl Config {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).is_some_and(|value| !value.is_empty());

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            metadata_always: flag("CRWL_METADATA"),
            mode: lookup("CRWL_MODE")
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.mode),
            start_sequence: number(&lookup, "CRWL_SEQN").unwrap_or(defaults.start_sequence),
            out_of_order: flag("CRWL_FORCE_OUT_OF_ORDER"),
            bit_errors: flag("CRWL_FORCE_ERROR"),
            duplicate_first: flag("CRWL_FORCE_DUPLICATE"),
            fec: !flag("CRWL_NO_HAMMING"),
            compression: !flag("CRWL_NO_RLE"),
            receive_timeout: number(&lookup, "CRWL_RX_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.receive_timeout),
            ..defaults
        };

        Config {
            server: lookup("CRWL_SERVER")
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            agents: number::<usize, _>(&lookup, "CRWL_NB_CRAWLERS")
                .filter(|&agents| agents > 0)
                .unwrap_or(DEFAULT_AGENTS),
            seed: number(&lookup, "CRWL_SEED"),
            session,
            debug: flag("CRWL_DEBUG"),
        }
    }

    /// Log the resolved configuration.
    pub fn print(&self) {
        let session = &self.session;
        tracing::debug!("=== Configuration ===");
        tracing::debug!("Receiver: {}", self.server);
        tracing::debug!(
            "Agents: {} (seed: {})",
            self.agents,
            self.seed.map_or("random".to_string(), |s| s.to_string())
        );
        tracing::debug!(
            "Mode: {}, start sequence: {}, metadata always: {}",
            session.mode,
            session.start_sequence,
            session.metadata_always
        );
        tracing::debug!(
            "Hamming: {}, RLE: {}, receive timeout: {:?}",
            session.fec,
            session.compression,
            session.receive_timeout
        );
        tracing::debug!(
            "Faults: out-of-order {}, bit errors {}, duplicate first {}",
            session.out_of_order,
            session.bit_errors,
            session.duplicate_first
        );
    }
}

fn number<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)?.trim().parse().ok()
}
