//! Consensus and runtime configuration for **pebblechain** core.
//!
//! The [`Config`] struct centralises tunable parameters such as difficulty
//! targets, the coinbase reward schedule, and the consensus rendezvous
//! window. It is constructed via the [`ConfigBuilder`] using the fluent
//! builder pattern, enabling callers to customise only the fields they care
//! about while keeping sensible defaults.
//!
//! All fields are `pub` so read-only access is ergonomic, however mutation
//! should occur through the builder to preserve validation invariants.
//!
//! ```
//! use pebblechain_core::config::Config;
//!
//! // default configuration
//! let cfg = Config::default();
//! assert_eq!(cfg.difficulty, 3);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime configuration shared across the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Number of leading hex-zero characters a block hash must have.
    pub difficulty: u32,

    /// Coinbase subsidy paid to the miner of each block.
    pub block_reward: f64,

    /// Human-readable name identifying the network (e.g. "main", "test").
    pub network: String,

    /// How long a node waits for a `consensus_resp` after broadcasting
    /// `consensus` before giving up and minting a fresh genesis block.
    pub rendezvous_window: Duration,

    /// Default gossip listen port, overridable by the CLI's positional
    /// argument.
    pub bind_port: u16,

    /// Directory wallet files are written under.
    pub wallets_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            difficulty: 3,
            block_reward: 50.0,
            network: "main".into(),
            rendezvous_window: Duration::from_secs(2),
            bind_port: 5000,
            wallets_dir: PathBuf::from("wallets"),
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self { inner: Config::default() }
    }

    pub fn difficulty(mut self, diff: u32) -> Self {
        self.inner.difficulty = diff;
        self
    }

    pub fn block_reward(mut self, reward: f64) -> Self {
        self.inner.block_reward = reward;
        self
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    pub fn rendezvous_window(mut self, window: Duration) -> Self {
        self.inner.rendezvous_window = window;
        self
    }

    pub fn bind_port(mut self, port: u16) -> Self {
        self.inner.bind_port = port;
        self
    }

    pub fn wallets_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.inner.wallets_dir = dir.into();
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .difficulty(5)
            .block_reward(25.0)
            .network("test")
            .bind_port(6000)
            .finish();
        assert_eq!(cfg.difficulty, 5);
        assert_eq!(cfg.block_reward, 25.0);
        assert_eq!(cfg.network, "test");
        assert_eq!(cfg.bind_port, 6000);
    }
}
