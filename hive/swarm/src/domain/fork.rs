// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Fork Value Objects (ADR-120)
//!
//! A fork is one isolated exploratory execution inside a swarm round. Its
//! result is transient: kept for the duration of the round, discarded after
//! fusion except for the artifact it contributed to.

use chrono::{DateTime, Utc};
use hive_core::domain::artifact::{ArtifactId, ArtifactScore};
use hive_core::domain::mode::SystemMode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one fork execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForkId(pub Uuid);

impl ForkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ForkId {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameter set handed to one fork.
///
/// Parameter sets within a round are distinct; the planner biases the entropy
/// band by the round's [`SystemMode`], which is passed in explicitly rather
/// than read from any global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkParameters {
    /// Position within the round, `0..width`. The lowest index wins final
    /// tie-breaks, which keeps selection deterministic.
    pub index: u32,
    pub mode: SystemMode,
    /// Exploration entropy in `[0, 1]`.
    pub entropy: f64,
    /// Deterministic seed derived from round number and index.
    pub seed: u64,
}

/// Metric vector reported by a completed fork. All axes in `[0, 1]`,
/// higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForkMetrics {
    pub continuity: f64,
    pub novelty: f64,
    pub regression_pass_rate: f64,
}

impl ForkMetrics {
    pub fn new(continuity: f64, novelty: f64, regression_pass_rate: f64) -> Self {
        Self {
            continuity: continuity.clamp(0.0, 1.0),
            novelty: novelty.clamp(0.0, 1.0),
            regression_pass_rate: regression_pass_rate.clamp(0.0, 1.0),
        }
    }

    /// Strict Pareto dominance: at least as good on every axis, strictly
    /// better on at least one.
    pub fn dominates(&self, other: &ForkMetrics) -> bool {
        let ge = self.continuity >= other.continuity
            && self.novelty >= other.novelty
            && self.regression_pass_rate >= other.regression_pass_rate;
        let gt = self.continuity > other.continuity
            || self.novelty > other.novelty
            || self.regression_pass_rate > other.regression_pass_rate;
        ge && gt
    }

    pub fn mean(&self) -> f64 {
        (self.continuity + self.novelty + self.regression_pass_rate) / 3.0
    }

    pub fn to_score(self) -> ArtifactScore {
        ArtifactScore::new(self.continuity, self.novelty, self.regression_pass_rate)
    }
}

/// Terminal status of one fork execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForkStatus {
    Completed,
    Failed,
    /// Did not finish inside the round timeout. Excluded from selection and
    /// never retried automatically; retry policy belongs to the caller.
    TimedOut,
    Cancelled,
}

/// Transient per-fork record owned by the engine for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkResult {
    pub id: ForkId,
    pub index: u32,
    pub parameters: ForkParameters,
    pub status: ForkStatus,
    /// Present only for completed forks.
    pub metrics: Option<ForkMetrics>,
    /// Candidate payload produced by the fork, if any.
    pub payload: Option<serde_json::Value>,
    /// Failure detail for failed forks.
    pub error: Option<String>,
    /// Set once the round's fused output is committed.
    pub artifact_id: Option<ArtifactId>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ForkResult {
    /// Survivors are the forks eligible for selection.
    pub fn survived(&self) -> bool {
        self.status == ForkStatus::Completed && self.metrics.is_some() && self.payload.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominance_is_strict() {
        let a = ForkMetrics::new(0.9, 0.9, 0.9);
        let b = ForkMetrics::new(0.9, 0.8, 0.9);
        let c = ForkMetrics::new(0.9, 0.9, 0.9);

        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
        // Equal vectors do not dominate each other.
        assert!(!a.dominates(&c));
        assert!(!c.dominates(&a));
    }

    #[test]
    fn test_incomparable_vectors() {
        let a = ForkMetrics::new(1.0, 0.2, 0.5);
        let b = ForkMetrics::new(0.2, 1.0, 0.5);
        assert!(!a.dominates(&b));
        assert!(!b.dominates(&a));
    }

    #[test]
    fn test_metrics_clamped() {
        let m = ForkMetrics::new(2.0, -1.0, 0.5);
        assert_eq!(m.continuity, 1.0);
        assert_eq!(m.novelty, 0.0);
    }
}
