// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Round Aggregate (ADR-120)
//!
//! One swarm round walks `PLAN → DISPATCH → COLLECT → SELECT → FUSE → COMMIT`.
//! Rounds are strictly sequential: round N+1's PLAN happens-after round N's
//! COMMIT.

use crate::domain::fork::ForkResult;
use chrono::{DateTime, Utc};
use hive_core::application::ledger_service::LedgerServiceError;
use hive_core::domain::artifact::Artifact;
use hive_core::domain::mode::SystemMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a swarm round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundId(pub Uuid);

impl RoundId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

/// Phases of the round state machine, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundPhase {
    Plan,
    Dispatch,
    Collect,
    Select,
    Fuse,
    Commit,
}

/// Errors surfaced by the swarm engine.
///
/// `RoundTimeout` and `AllForksFailed` are non-fatal: the round degrades to
/// an empty-round commit and reports the degradation on the outcome. Only a
/// commit failure (ledger/store) aborts a round.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Round timed out before all forks completed")]
    RoundTimeout,

    #[error("All forks failed or timed out; nothing to select")]
    AllForksFailed,

    #[error(transparent)]
    Commit(#[from] LedgerServiceError),
}

/// Result of one committed round.
#[derive(Debug)]
pub struct RoundOutcome {
    pub id: RoundId,
    /// Monotonic round number within this engine instance.
    pub number: u64,
    /// Mode the round was planned under.
    pub mode: SystemMode,
    /// The committed artifact: a synthesis, a diagnostic, or an empty-round
    /// marker. Always present; a round never skips ledger insertion.
    pub artifact: Artifact,
    pub dispatched: usize,
    /// Fork indexes that survived to selection, ascending.
    pub survivors: Vec<u32>,
    /// Consensus champion among the survivors, if any survived.
    pub champion: Option<u32>,
    pub timed_out: usize,
    pub failed: usize,
    /// Per-fork records, index order. Transient; dropped with the outcome.
    pub forks: Vec<ForkResult>,
    /// Set when the round degraded to an empty commit.
    pub degraded: Option<SwarmError>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RoundOutcome {
    pub fn is_empty_round(&self) -> bool {
        self.survivors.is_empty()
    }

    /// Mean continuity across surviving forks; 0 when nothing survived.
    pub fn continuity_ratio(&self) -> f64 {
        self.mean_metric(|m| m.continuity)
    }

    /// Mean regression pass rate across surviving forks; 0 when nothing
    /// survived.
    pub fn regression_pass_rate(&self) -> f64 {
        self.mean_metric(|m| m.regression_pass_rate)
    }

    fn mean_metric(&self, pick: impl Fn(&crate::domain::fork::ForkMetrics) -> f64) -> f64 {
        let values: Vec<f64> = self
            .forks
            .iter()
            .filter(|f| f.survived())
            .filter_map(|f| f.metrics.as_ref().map(&pick))
            .collect();
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }
}
