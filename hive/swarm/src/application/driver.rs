// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Round Driver (ADR-121)
//!
//! Sequential loop closing the feedback cycle: run a round, sample aggregate
//! KPIs, feed the homeostatic controller, and thread the resulting mode into
//! the next round's PLAN. Round N+1 never starts before round N committed.
//!
//! While the controller holds RECOVER, normal rounds are suspended: the
//! driver runs a full ledger validation sweep plus one reduced-width
//! diagnostic round instead.

use crate::application::engine::SwarmEngine;
use crate::domain::round::{RoundOutcome, SwarmError};
use chrono::Utc;
use hive_core::application::ledger_service::LedgerService;
use hive_core::domain::artifact::ArtifactId;
use hive_core::domain::events::HiveEvent;
use hive_core::domain::ledger::LineageLedger;
use hive_core::domain::mode::{Homeostat, KpiSample, SystemMode};
use hive_core::infrastructure::event_bus::EventBus;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

/// Source of aggregate KPI samples fed to the homeostatic controller.
pub trait KpiSource: Send + Sync {
    fn sample(&self, outcome: &RoundOutcome, ledger: &LineageLedger) -> KpiSample;
}

/// Default KPI derivation:
///
/// - `cascade_probability` — mean surviving-fork count over a sliding window
///   of recent rounds (expected children spawned per committed artifact).
/// - `continuity_ratio`, `regression_pass_rate` — survivor means from the
///   round just committed; an empty round reports zero health, which is what
///   pushes the controller toward RECOVER.
pub struct LedgerKpiSource {
    window: Mutex<VecDeque<usize>>,
    window_size: usize,
}

impl LedgerKpiSource {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: Mutex::new(VecDeque::new()),
            window_size: window_size.max(1),
        }
    }
}

impl Default for LedgerKpiSource {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KpiSource for LedgerKpiSource {
    fn sample(&self, outcome: &RoundOutcome, _ledger: &LineageLedger) -> KpiSample {
        let mut window = self.window.lock();
        window.push_back(outcome.survivors.len());
        while window.len() > self.window_size {
            window.pop_front();
        }
        let cascade_probability =
            window.iter().sum::<usize>() as f64 / window.len() as f64;

        KpiSample {
            cascade_probability,
            continuity_ratio: outcome.continuity_ratio(),
            regression_pass_rate: outcome.regression_pass_rate(),
            sampled_at: Utc::now(),
        }
    }
}

/// Drives sequential rounds, closing the homeostatic loop.
pub struct RoundDriver {
    engine: Arc<SwarmEngine>,
    ledger_service: Arc<LedgerService>,
    bus: Arc<EventBus>,
    homeostat: Mutex<Homeostat>,
    kpi: Arc<dyn KpiSource>,
}

impl RoundDriver {
    pub fn new(
        engine: Arc<SwarmEngine>,
        ledger_service: Arc<LedgerService>,
        bus: Arc<EventBus>,
        homeostat: Homeostat,
        kpi: Arc<dyn KpiSource>,
    ) -> Self {
        Self {
            engine,
            ledger_service,
            bus,
            homeostat: Mutex::new(homeostat),
            kpi,
        }
    }

    pub fn current_mode(&self) -> SystemMode {
        self.homeostat.lock().current()
    }

    /// Run `rounds` sequential rounds starting from `seeds`. Each committed
    /// artifact seeds the next round.
    pub async fn run_rounds(
        &self,
        rounds: usize,
        seeds: Vec<ArtifactId>,
    ) -> Result<Vec<RoundOutcome>, SwarmError> {
        let mut seeds = seeds;
        let mut outcomes = Vec::with_capacity(rounds);

        for _ in 0..rounds {
            let mode = self.current_mode();

            if mode == SystemMode::Recover {
                // Normal rounds are suspended: sweep the ledger, then probe
                // with a reduced-width diagnostic round.
                let issues = self.ledger_service.validate();
                if issues.is_empty() {
                    info!("Recovery sweep found a consistent ledger");
                } else {
                    warn!(issues = issues.len(), "Recovery sweep found ledger issues");
                }
            }

            let outcome = self.engine.run_round(mode, &seeds).await?;

            let sample = self.kpi.sample(&outcome, self.ledger_service.ledger());
            let decision = self.homeostat.lock().observe(&sample);
            if decision.changed {
                self.bus.publish_event(&HiveEvent::ModeChanged {
                    from: mode,
                    to: decision.mode,
                    changed_at: Utc::now(),
                });
            }

            seeds = vec![outcome.artifact.id.clone()];
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fork::{ForkId, ForkMetrics, ForkParameters, ForkResult, ForkStatus};
    use crate::domain::round::RoundId;
    use hive_core::domain::artifact::ArtifactPayload;
    use serde_json::json;

    fn outcome_with_survivors(n: usize) -> RoundOutcome {
        let ledger = LineageLedger::new();
        let artifact = ledger
            .insert(ArtifactPayload::Opaque(json!("x")), &[], None)
            .unwrap();
        let forks: Vec<ForkResult> = (0..n as u32)
            .map(|index| ForkResult {
                id: ForkId::new(),
                index,
                parameters: ForkParameters {
                    index,
                    mode: SystemMode::Explore,
                    entropy: 0.5,
                    seed: 0,
                },
                status: ForkStatus::Completed,
                metrics: Some(ForkMetrics::new(1.0, 0.5, 1.0)),
                payload: Some(json!({})),
                error: None,
                artifact_id: None,
                finished_at: Some(Utc::now()),
            })
            .collect();
        RoundOutcome {
            id: RoundId::new(),
            number: 1,
            mode: SystemMode::Explore,
            artifact,
            dispatched: n,
            survivors: (0..n as u32).collect(),
            champion: (n > 0).then_some(0),
            timed_out: 0,
            failed: 0,
            forks,
            degraded: None,
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_kpi_cascade_averages_over_window() {
        let source = LedgerKpiSource::new(3);
        let ledger = LineageLedger::new();

        let s1 = source.sample(&outcome_with_survivors(4), &ledger);
        assert!((s1.cascade_probability - 4.0).abs() < 1e-9);

        source.sample(&outcome_with_survivors(2), &ledger);
        let s3 = source.sample(&outcome_with_survivors(0), &ledger);
        assert!((s3.cascade_probability - 2.0).abs() < 1e-9);

        // Window slides: the 4 falls out.
        let s4 = source.sample(&outcome_with_survivors(1), &ledger);
        assert!((s4.cascade_probability - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_round_reports_zero_health() {
        let source = LedgerKpiSource::default();
        let ledger = LineageLedger::new();
        let sample = source.sample(&outcome_with_survivors(0), &ledger);
        assert_eq!(sample.continuity_ratio, 0.0);
        assert_eq!(sample.regression_pass_rate, 0.0);
    }
}
