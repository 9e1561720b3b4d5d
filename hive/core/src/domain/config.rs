// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Engine Configuration Surface
//!
//! Every tunable the engine consults — reinforcement factors, prune
//! thresholds, fork counts, round timeouts, homeostatic thresholds — is
//! supplied here at startup. Defaults exist for local development but every
//! knob is overridable; no hidden constants live inside logic paths.
//!
//! The file format is YAML, matching the manifest conventions used across the
//! AEGIS node configuration surface. Durations accept humantime strings
//! ("30s", "2m").

use crate::domain::mode::HomeostatConfig;
use crate::domain::routing::RoutingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Event bus tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Per-subscriber buffered event capacity; oldest-unread events are
    /// dropped beyond this (deliberate lossy-broadcast policy).
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,

    /// Half-life of the trail-strength frequency counters.
    #[serde(with = "humantime_serde", default = "default_trail_half_life")]
    pub trail_half_life: Duration,
}

fn default_bus_capacity() -> usize {
    1024
}

fn default_trail_half_life() -> Duration {
    Duration::from_secs(120)
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
            trail_half_life: default_trail_half_life(),
        }
    }
}

/// Artifact store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base directory for persisted artifact documents.
    #[serde(default = "default_store_path")]
    pub base_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("hive-data/artifacts")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_path: default_store_path(),
        }
    }
}

/// Consensus selection policy for swarm rounds.
///
/// The selection rule is deliberately configurable: the default
/// Pareto-then-majority pipeline is the most defensible synthesis, not a
/// compatibility contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Pareto frontier, then majority vote across selector heuristics,
    /// ties broken by novelty then fork index.
    ParetoMajority,
    /// Pareto frontier only; champion is the deterministic tie-break winner.
    ParetoOnly,
    /// Single best fork by mean metric; frontier of one.
    BestScore,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::ParetoMajority
    }
}

/// Swarm round tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Target fork count per round.
    #[serde(default = "default_fork_count")]
    pub fork_count: usize,

    /// Bound on COLLECT; stragglers are cancelled and excluded.
    #[serde(with = "humantime_serde", default = "default_round_timeout")]
    pub round_timeout: Duration,

    /// How many selected forks feed fusion. `None` fuses every Pareto
    /// survivor.
    #[serde(default)]
    pub fusion_top_k: Option<usize>,

    #[serde(default)]
    pub selection: SelectionPolicy,

    /// Entropy band the planner samples from.
    #[serde(default = "default_entropy_floor")]
    pub entropy_floor: f64,
    #[serde(default = "default_entropy_ceiling")]
    pub entropy_ceiling: f64,

    /// Fork width used for diagnostic rounds while recovering.
    #[serde(default = "default_diagnostic_width")]
    pub diagnostic_width: usize,

    /// Width divisor applied in THROTTLE mode.
    #[serde(default = "default_throttle_divisor")]
    pub throttle_divisor: usize,
}

fn default_fork_count() -> usize {
    5
}

fn default_round_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_entropy_floor() -> f64 {
    0.05
}

fn default_entropy_ceiling() -> f64 {
    0.95
}

fn default_diagnostic_width() -> usize {
    2
}

fn default_throttle_divisor() -> usize {
    2
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            fork_count: default_fork_count(),
            round_timeout: default_round_timeout(),
            fusion_top_k: None,
            selection: SelectionPolicy::default(),
            entropy_floor: default_entropy_floor(),
            entropy_ceiling: default_entropy_ceiling(),
            diagnostic_width: default_diagnostic_width(),
            throttle_divisor: default_throttle_divisor(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HiveConfig {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub homeostat: HomeostatConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl HiveConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: HiveConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Reject configurations whose factors invert the reinforcement
    /// semantics or whose bands are empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.routing.reinforcement_factor <= 1.0 {
            return Err(ConfigError::Invalid(
                "routing.reinforcement_factor must be > 1.0".to_string(),
            ));
        }
        if self.routing.decay_factor <= 0.0 || self.routing.decay_factor >= 1.0 {
            return Err(ConfigError::Invalid(
                "routing.decay_factor must be in (0, 1)".to_string(),
            ));
        }
        if self.routing.prune_below >= self.routing.highway_above {
            return Err(ConfigError::Invalid(
                "routing.prune_below must be below routing.highway_above".to_string(),
            ));
        }
        if self.swarm.fork_count == 0 {
            return Err(ConfigError::Invalid(
                "swarm.fork_count must be at least 1".to_string(),
            ));
        }
        if self.swarm.entropy_floor >= self.swarm.entropy_ceiling {
            return Err(ConfigError::Invalid(
                "swarm.entropy_floor must be below swarm.entropy_ceiling".to_string(),
            ));
        }
        if self.homeostat.hysteresis_samples == 0 {
            return Err(ConfigError::Invalid(
                "homeostat.hysteresis_samples must be at least 1".to_string(),
            ));
        }
        if !(self.homeostat.synthesize_at < self.homeostat.exploit_at
            && self.homeostat.exploit_at < self.homeostat.throttle_at)
        {
            return Err(ConfigError::Invalid(
                "homeostat cascade thresholds must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }
}
