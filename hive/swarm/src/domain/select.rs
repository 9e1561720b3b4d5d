// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Consensus Selection (ADR-120)
//!
//! SELECT computes the Pareto frontier over surviving forks' metric vectors,
//! then resolves a champion by majority vote across independent selector
//! heuristics. Disagreements break by highest novelty, then lowest fork
//! index, so the result is deterministic for a given fork set.
//!
//! The policy is configurable ([`SelectionPolicy`]); nothing downstream
//! assumes the default pipeline is load-bearing.

use crate::domain::fork::ForkResult;
use hive_core::domain::config::SelectionPolicy;
use serde::Serialize;
use tracing::debug;

/// One heuristic's vote: which surviving fork it would champion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeuristicVote {
    pub heuristic: &'static str,
    pub fork_index: u32,
}

/// Result of SELECT.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    /// Fork indexes on the Pareto frontier, ascending.
    pub frontier: Vec<u32>,
    /// Consensus champion.
    pub champion: u32,
    /// Individual heuristic votes, for observability.
    pub votes: Vec<HeuristicVote>,
}

/// Compute the Pareto frontier over surviving forks.
///
/// A fork is on the frontier iff no other survivor strictly dominates its
/// metric vector on every axis.
pub fn pareto_frontier(forks: &[ForkResult]) -> Vec<&ForkResult> {
    let survivors: Vec<&ForkResult> = forks.iter().filter(|f| f.survived()).collect();
    survivors
        .iter()
        .filter(|candidate| {
            let cm = candidate.metrics.as_ref().expect("survivor has metrics");
            !survivors.iter().any(|other| {
                other.index != candidate.index
                    && other
                        .metrics
                        .as_ref()
                        .expect("survivor has metrics")
                        .dominates(cm)
            })
        })
        .copied()
        .collect()
}

/// Apply the configured selection policy. Returns `None` when no fork
/// survived collection.
pub fn select(policy: SelectionPolicy, forks: &[ForkResult]) -> Option<Selection> {
    let mut frontier = pareto_frontier(forks);
    if frontier.is_empty() {
        return None;
    }
    frontier.sort_by_key(|f| f.index);

    let selection = match policy {
        SelectionPolicy::ParetoMajority => {
            let votes = cast_votes(&frontier);
            let champion = majority_champion(&frontier, &votes);
            Selection {
                frontier: frontier.iter().map(|f| f.index).collect(),
                champion,
                votes,
            }
        }
        SelectionPolicy::ParetoOnly => Selection {
            frontier: frontier.iter().map(|f| f.index).collect(),
            champion: tie_break(&frontier),
            votes: Vec::new(),
        },
        SelectionPolicy::BestScore => {
            let champion = frontier
                .iter()
                .max_by(|a, b| {
                    let am = a.metrics.as_ref().expect("survivor has metrics").mean();
                    let bm = b.metrics.as_ref().expect("survivor has metrics").mean();
                    am.total_cmp(&bm).then(b.index.cmp(&a.index))
                })
                .map(|f| f.index)
                .expect("frontier is non-empty");
            Selection {
                frontier: vec![champion],
                champion,
                votes: Vec::new(),
            }
        }
    };

    debug!(
        frontier = ?selection.frontier,
        champion = selection.champion,
        "Selection resolved"
    );
    Some(selection)
}

/// The independent selector heuristics. Each prefers a different axis, so
/// they genuinely disagree on skewed metric vectors.
fn cast_votes(frontier: &[&ForkResult]) -> Vec<HeuristicVote> {
    let by_axis = |name: &'static str, pick: fn(&crate::domain::fork::ForkMetrics) -> f64| {
        frontier
            .iter()
            .max_by(|a, b| {
                let am = pick(a.metrics.as_ref().expect("survivor has metrics"));
                let bm = pick(b.metrics.as_ref().expect("survivor has metrics"));
                // Lowest index wins exact ties within a heuristic.
                am.total_cmp(&bm).then(b.index.cmp(&a.index))
            })
            .map(|f| HeuristicVote {
                heuristic: name,
                fork_index: f.index,
            })
    };

    [
        by_axis("continuity", |m| m.continuity),
        by_axis("novelty", |m| m.novelty),
        by_axis("regression", |m| m.regression_pass_rate),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Majority vote over heuristic champions; vote ties break by highest
/// novelty, then lowest fork index.
fn majority_champion(frontier: &[&ForkResult], votes: &[HeuristicVote]) -> u32 {
    let mut tallies: Vec<(u32, usize)> = Vec::new();
    for vote in votes {
        match tallies.iter_mut().find(|(idx, _)| *idx == vote.fork_index) {
            Some((_, count)) => *count += 1,
            None => tallies.push((vote.fork_index, 1)),
        }
    }

    let top_count = tallies.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let tied: Vec<&ForkResult> = frontier
        .iter()
        .filter(|f| {
            tallies
                .iter()
                .any(|(idx, count)| *idx == f.index && *count == top_count)
        })
        .copied()
        .collect();

    match tied.len() {
        0 => tie_break(frontier),
        1 => tied[0].index,
        _ => tie_break(&tied),
    }
}

/// Deterministic tie-break: highest novelty, then lowest fork index.
fn tie_break(candidates: &[&ForkResult]) -> u32 {
    candidates
        .iter()
        .max_by(|a, b| {
            let an = a.metrics.as_ref().expect("survivor has metrics").novelty;
            let bn = b.metrics.as_ref().expect("survivor has metrics").novelty;
            an.total_cmp(&bn).then(b.index.cmp(&a.index))
        })
        .map(|f| f.index)
        .expect("tie_break called with candidates")
}
