// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Round Engine (ADR-120)
//!
//! Drives one round through `PLAN → DISPATCH → COLLECT → SELECT → FUSE →
//! COMMIT`:
//!
//! - DISPATCH spawns each fork as an isolated tokio task; forks share no
//!   mutable state and never hold ledger or routing locks while executing.
//! - COLLECT is bounded by the round timeout. At the deadline outstanding
//!   forks are cancelled cooperatively (they observe a [`CancellationToken`])
//!   and marked timed out; they are excluded from selection and never retried
//!   here — retry policy belongs to the caller.
//! - COMMIT always inserts an artifact. A round with zero survivors commits
//!   an empty-round marker so lineage depth accounting stays consistent; it
//!   never silently skips ledger insertion.
//!
//! Per-fork outcomes are reported to the routing graph, and a round-complete
//! event is published on the bus.

use crate::application::planner::Planner;
use crate::domain::fork::{ForkId, ForkMetrics, ForkParameters, ForkResult, ForkStatus};
use crate::domain::fuse::fuse;
use crate::domain::round::{RoundId, RoundOutcome, RoundPhase, SwarmError};
use crate::domain::select::select;
use async_trait::async_trait;
use chrono::Utc;
use hive_core::application::ledger_service::LedgerService;
use hive_core::domain::artifact::{ArtifactId, ArtifactPayload};
use hive_core::domain::config::SwarmConfig;
use hive_core::domain::events::HiveEvent;
use hive_core::domain::mode::SystemMode;
use hive_core::domain::routing::RoutingGraph;
use hive_core::infrastructure::event_bus::EventBus;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Candidate produced by one fork execution.
#[derive(Debug, Clone)]
pub struct ForkOutput {
    pub payload: Value,
    pub metrics: ForkMetrics,
}

/// Port to whatever performs the actual exploratory computation.
///
/// Implementations must be isolated per call (no shared mutable state across
/// concurrent executions) and must observe `cancel` promptly: a cancelled
/// fork's return value is discarded.
#[async_trait]
pub trait ForkExecutor: Send + Sync {
    async fn execute(
        &self,
        parameters: ForkParameters,
        cancel: CancellationToken,
    ) -> anyhow::Result<ForkOutput>;
}

/// How long COLLECT waits after cancellation for cooperative returns before
/// aborting what is left.
const CANCEL_GRACE: Duration = Duration::from_millis(250);

/// Swarm consensus engine. One instance drives sequential rounds; rounds are
/// never pipelined.
pub struct SwarmEngine {
    config: SwarmConfig,
    planner: Planner,
    ledger: Arc<LedgerService>,
    routing: Arc<RoutingGraph>,
    bus: Arc<EventBus>,
    executor: Arc<dyn ForkExecutor>,
    round_counter: AtomicU64,
    /// Entropy of the most recent champion, fed back into EXPLOIT planning.
    best_entropy: Mutex<Option<f64>>,
}

impl SwarmEngine {
    pub fn new(
        config: SwarmConfig,
        ledger: Arc<LedgerService>,
        routing: Arc<RoutingGraph>,
        bus: Arc<EventBus>,
        executor: Arc<dyn ForkExecutor>,
    ) -> Self {
        Self {
            planner: Planner::new(config.clone()),
            config,
            ledger,
            routing,
            bus,
            executor,
            round_counter: AtomicU64::new(0),
            best_entropy: Mutex::new(None),
        }
    }

    /// Rounds completed so far by this engine instance.
    pub fn rounds_run(&self) -> u64 {
        self.round_counter.load(Ordering::SeqCst)
    }

    /// Run one full round under the given mode.
    ///
    /// The mode is threaded in explicitly so rounds are independently
    /// testable; the engine holds no notion of a current mode.
    #[instrument(skip_all, fields(mode = mode.label()))]
    pub async fn run_round(
        &self,
        mode: SystemMode,
        seeds: &[ArtifactId],
    ) -> Result<RoundOutcome, SwarmError> {
        let number = self.round_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let round_id = RoundId::new();
        let started_at = Utc::now();

        debug!(round = number, phase = ?RoundPhase::Plan, "Round started");
        let hint = *self.best_entropy.lock();
        let plan = self.planner.plan(number, mode, hint);
        let dispatched = plan.len();

        debug!(round = number, phase = ?RoundPhase::Dispatch, forks = dispatched, "Dispatching forks");
        let cancel = CancellationToken::new();
        let mut join_set: JoinSet<(u32, anyhow::Result<ForkOutput>)> = JoinSet::new();
        for parameters in plan.clone() {
            let executor = Arc::clone(&self.executor);
            let child = cancel.child_token();
            join_set.spawn(async move {
                let index = parameters.index;
                (index, executor.execute(parameters, child).await)
            });
        }

        debug!(round = number, phase = ?RoundPhase::Collect, "Collecting fork results");
        let (outputs, round_timed_out) = self.collect(&mut join_set, &cancel).await;

        let mut forks: Vec<ForkResult> = plan
            .into_iter()
            .map(|parameters| {
                let index = parameters.index;
                let (status, metrics, payload, error) = match outputs.get(&index) {
                    Some(Ok(output)) => (
                        ForkStatus::Completed,
                        Some(output.metrics),
                        Some(output.payload.clone()),
                        None,
                    ),
                    Some(Err(message)) => {
                        (ForkStatus::Failed, None, None, Some(message.clone()))
                    }
                    None => (ForkStatus::TimedOut, None, None, None),
                };
                ForkResult {
                    id: ForkId::new(),
                    index,
                    parameters,
                    status,
                    metrics,
                    payload,
                    error,
                    artifact_id: None,
                    finished_at: Some(Utc::now()),
                }
            })
            .collect();

        let timed_out = forks
            .iter()
            .filter(|f| f.status == ForkStatus::TimedOut)
            .count();
        let failed = forks
            .iter()
            .filter(|f| f.status == ForkStatus::Failed)
            .count();
        metrics::counter!("hive_swarm_forks_timed_out").increment(timed_out as u64);

        debug!(round = number, phase = ?RoundPhase::Select, "Selecting survivors");
        let selection = select(self.config.selection, &forks);

        // FUSE and COMMIT run inline; COMMIT happens-after every COLLECT
        // result for the round.
        let outcome = match selection {
            Some(selection) => {
                let fusion = fuse(mode, &selection, &forks, self.config.fusion_top_k);
                let artifact = self
                    .ledger
                    .insert(fusion.payload, seeds, Some(fusion.score))
                    .await?;

                if let Some(champion_fork) =
                    forks.iter().find(|f| f.index == selection.champion)
                {
                    *self.best_entropy.lock() = Some(champion_fork.parameters.entropy);
                }
                for fork in &mut forks {
                    if selection.frontier.contains(&fork.index) {
                        fork.artifact_id = Some(artifact.id.clone());
                    }
                }

                self.report_routing(mode, &forks);
                self.bus.publish_event(&HiveEvent::RoundCompleted {
                    round: number,
                    mode,
                    artifact_id: artifact.id.clone(),
                    surviving_forks: selection.frontier.len(),
                    dispatched_forks: dispatched,
                    completed_at: Utc::now(),
                });
                metrics::counter!("hive_swarm_rounds_completed").increment(1);

                info!(
                    round = number,
                    artifact = %artifact.id.short(),
                    survivors = selection.frontier.len(),
                    dispatched,
                    "Round committed"
                );

                RoundOutcome {
                    id: round_id,
                    number,
                    mode,
                    artifact,
                    dispatched,
                    survivors: selection.frontier.clone(),
                    champion: Some(selection.champion),
                    timed_out,
                    failed,
                    forks,
                    degraded: None,
                    started_at,
                    completed_at: Utc::now(),
                }
            }
            None => {
                // Zero survivors: still commit, marking the round empty, so
                // depth accounting stays consistent.
                let degraded = if round_timed_out && timed_out == dispatched {
                    SwarmError::RoundTimeout
                } else {
                    SwarmError::AllForksFailed
                };
                let reason = format!("round {number}: {degraded}");

                let artifact = self
                    .ledger
                    .insert(
                        ArtifactPayload::EmptyRound {
                            reason: reason.clone(),
                        },
                        seeds,
                        None,
                    )
                    .await?;

                self.report_routing(mode, &forks);
                self.bus.publish_event(&HiveEvent::RoundEmpty {
                    round: number,
                    mode,
                    artifact_id: artifact.id.clone(),
                    reason,
                    completed_at: Utc::now(),
                });
                metrics::counter!("hive_swarm_rounds_empty").increment(1);

                warn!(round = number, timed_out, failed, "Round committed empty");

                RoundOutcome {
                    id: round_id,
                    number,
                    mode,
                    artifact,
                    dispatched,
                    survivors: Vec::new(),
                    champion: None,
                    timed_out,
                    failed,
                    forks,
                    degraded: Some(degraded),
                    started_at,
                    completed_at: Utc::now(),
                }
            }
        };

        Ok(outcome)
    }

    /// Wait for fork completions until the round deadline, then cancel
    /// cooperatively and drain.
    async fn collect(
        &self,
        join_set: &mut JoinSet<(u32, anyhow::Result<ForkOutput>)>,
        cancel: &CancellationToken,
    ) -> (HashMap<u32, Result<ForkOutput, String>>, bool) {
        let deadline = tokio::time::Instant::now() + self.config.round_timeout;
        let mut outputs: HashMap<u32, Result<ForkOutput, String>> = HashMap::new();
        let mut timed_out = false;

        loop {
            let joined = tokio::select! {
                joined = join_set.join_next() => Some(joined),
                _ = tokio::time::sleep_until(deadline) => None,
            };

            match joined {
                // All forks accounted for.
                Some(None) => break,
                Some(Some(Ok((index, Ok(output))))) => {
                    outputs.insert(index, Ok(output));
                }
                Some(Some(Ok((index, Err(error))))) => {
                    debug!(fork = index, %error, "Fork failed");
                    outputs.insert(index, Err(error.to_string()));
                }
                Some(Some(Err(join_error))) => {
                    // A panicked fork is an isolated failure; it must never
                    // abort the round. Its slot stays empty and is marked
                    // timed out below.
                    warn!(%join_error, "Fork task aborted or panicked");
                }
                // Deadline reached with forks still outstanding.
                None => {
                    timed_out = true;
                    cancel.cancel();

                    // Grace window for cooperative returns; results arriving
                    // after the deadline are discarded either way.
                    let drained = tokio::time::timeout(CANCEL_GRACE, async {
                        while join_set.join_next().await.is_some() {}
                    })
                    .await;
                    if drained.is_err() {
                        join_set.abort_all();
                        while join_set.join_next().await.is_some() {}
                    }
                    break;
                }
            }
        }

        (outputs, timed_out)
    }

    /// Report each fork's success or failure along its planner route.
    fn report_routing(&self, mode: SystemMode, forks: &[ForkResult]) {
        let from = format!("mode/{}", mode.label());
        for fork in forks {
            let to = entropy_endpoint(fork.parameters.entropy);
            self.routing.record_outcome(&from, &to, fork.survived());
        }
    }
}

/// Endpoint name for an entropy value, bucketed to one decimal.
fn entropy_endpoint(entropy: f64) -> String {
    format!("entropy/{:.1}", (entropy * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_endpoint_buckets() {
        assert_eq!(entropy_endpoint(0.05), "entropy/0.1");
        assert_eq!(entropy_endpoint(0.44), "entropy/0.4");
        assert_eq!(entropy_endpoint(0.95), "entropy/1.0");
    }
}
