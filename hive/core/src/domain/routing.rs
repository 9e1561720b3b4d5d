// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Adaptive Routing Graph (ADR-119)
//!
//! Weighted graph of named endpoints whose edge weights are reinforced by
//! observed success and decayed by failure, in the manner of the cortex
//! dopamine/cortisol weighting (ADR-018). Consumers report outcomes; the graph
//! adapts which producer/consumer paths look promising.
//!
//! All mutation goes through [`RoutingGraph::record_outcome`] under a sharded
//! per-edge lock, so concurrent outcome reports from many forks never lose
//! updates. `Highway` status is an informational reporting marker only; it
//! never changes routing semantics.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Tunables for reinforcement, decay and pruning. All externally supplied at
/// startup; the defaults here are overridable, not baked into logic paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Weight assigned to an edge on first observation.
    pub baseline_weight: f64,
    /// Multiplier applied on success (> 1).
    pub reinforcement_factor: f64,
    /// Multiplier applied on failure (< 1).
    pub decay_factor: f64,
    /// Low-water mark: edges below this are removed on the next prune.
    pub prune_below: f64,
    /// High-water mark: edges above this are flagged `Highway`.
    pub highway_above: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            baseline_weight: 1.0,
            reinforcement_factor: 1.15,
            decay_factor: 0.85,
            prune_below: 0.25,
            highway_above: 4.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("No route from '{from}' to '{to}'")]
    NoPath { from: String, to: String },
}

/// Lifecycle status of a routing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeStatus {
    Active,
    Pruned,
    /// Reinforced past the high-water mark. Reporting marker only.
    Highway,
}

/// Directed weighted edge between two named endpoints.
///
/// Owned exclusively by [`RoutingGraph`]; mutated only through its
/// reinforcement/decay API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingEdge {
    pub from: String,
    pub to: String,
    pub weight: f64,
    pub status: EdgeStatus,
    pub last_used_at: DateTime<Utc>,
    pub successes: u64,
    pub failures: u64,
}

impl RoutingEdge {
    fn new(from: String, to: String, baseline: f64) -> Self {
        Self {
            from,
            to,
            weight: baseline,
            status: EdgeStatus::Active,
            last_used_at: Utc::now(),
            successes: 0,
            failures: 0,
        }
    }

    /// Multiply weight by the reinforcement factor.
    fn reinforce(&mut self, factor: f64) {
        self.weight *= factor;
        self.successes += 1;
        self.last_used_at = Utc::now();
    }

    /// Multiply weight by the decay factor.
    fn decay(&mut self, factor: f64) {
        self.weight *= factor;
        self.failures += 1;
        self.last_used_at = Utc::now();
    }
}

/// Outcome of a [`RoutingGraph::prune`] pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneSummary {
    pub pruned: Vec<(String, String)>,
    pub highways: Vec<(String, String)>,
    pub remaining: usize,
}

/// Point-in-time view for external report tooling.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingSnapshot {
    pub edges: Vec<RoutingEdge>,
    pub generated_at: DateTime<Utc>,
}

/// Weighted endpoint graph with success-reinforced edges (ADR-119).
pub struct RoutingGraph {
    config: RoutingConfig,
    edges: DashMap<(String, String), RoutingEdge>,
}

impl RoutingGraph {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            config,
            edges: DashMap::new(),
        }
    }

    /// Record an observed outcome for the `(from, to)` path.
    ///
    /// Creates the edge at baseline weight if absent, then multiplies by the
    /// reinforcement factor on success or the decay factor on failure. The
    /// DashMap shard entry serializes concurrent writers per edge.
    pub fn record_outcome(&self, from: &str, to: &str, success: bool) {
        let key = (from.to_string(), to.to_string());
        let mut edge = self.edges.entry(key).or_insert_with(|| {
            RoutingEdge::new(from.to_string(), to.to_string(), self.config.baseline_weight)
        });

        if success {
            edge.reinforce(self.config.reinforcement_factor);
            metrics::counter!("hive_routing_reinforced").increment(1);
        } else {
            edge.decay(self.config.decay_factor);
            metrics::counter!("hive_routing_decayed").increment(1);
        }

        debug!(
            from,
            to,
            success,
            weight = edge.weight,
            "Routing outcome recorded"
        );
    }

    /// Current weight of an edge, if it exists.
    pub fn weight(&self, from: &str, to: &str) -> Option<f64> {
        self.edges
            .get(&(from.to_string(), to.to_string()))
            .map(|e| e.weight)
    }

    /// Remove edges that fell below the low-water threshold and flag edges
    /// above the high-water threshold as highways.
    pub fn prune(&self) -> PruneSummary {
        let mut summary = PruneSummary::default();

        let mut doomed = Vec::new();
        for mut entry in self.edges.iter_mut() {
            if entry.weight < self.config.prune_below {
                entry.status = EdgeStatus::Pruned;
                doomed.push(entry.key().clone());
            } else if entry.weight > self.config.highway_above {
                entry.status = EdgeStatus::Highway;
                summary.highways.push(entry.key().clone());
            } else {
                entry.status = EdgeStatus::Active;
            }
        }

        for key in doomed {
            self.edges.remove(&key);
            summary.pruned.push(key);
        }

        summary.remaining = self.edges.len();
        metrics::counter!("hive_routing_pruned").increment(summary.pruned.len() as u64);
        summary
    }

    /// Highest-weight path from `from` to `to`.
    ///
    /// Dijkstra over inverse weights (cost `1/w`), which favors strongly
    /// reinforced edges and fewer hops. Returns the endpoint sequence
    /// including both ends, or [`RoutingError::NoPath`] when disconnected.
    pub fn best_path(&self, from: &str, to: &str) -> Result<Vec<String>, RoutingError> {
        if from == to && self.touches(from) {
            return Ok(vec![from.to_string()]);
        }

        // Adjacency rebuilt per query; path queries are reporting-grade, not
        // hot-path.
        let mut adjacency: HashMap<String, Vec<(String, f64)>> = HashMap::new();
        for entry in self.edges.iter() {
            adjacency
                .entry(entry.from.clone())
                .or_default()
                .push((entry.to.clone(), entry.weight));
        }

        #[derive(Debug)]
        struct State {
            cost: f64,
            node: String,
        }
        impl PartialEq for State {
            fn eq(&self, other: &Self) -> bool {
                self.cost == other.cost && self.node == other.node
            }
        }
        impl Eq for State {}
        impl Ord for State {
            fn cmp(&self, other: &Self) -> CmpOrdering {
                // Min-heap on cost; node name breaks ties deterministically.
                other
                    .cost
                    .total_cmp(&self.cost)
                    .then_with(|| other.node.cmp(&self.node))
            }
        }
        impl PartialOrd for State {
            fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
                Some(self.cmp(other))
            }
        }

        let mut best: HashMap<String, f64> = HashMap::new();
        let mut prev: HashMap<String, String> = HashMap::new();
        let mut heap = BinaryHeap::new();

        best.insert(from.to_string(), 0.0);
        heap.push(State {
            cost: 0.0,
            node: from.to_string(),
        });

        while let Some(State { cost, node }) = heap.pop() {
            if node == to {
                let mut path = vec![to.to_string()];
                let mut cursor = to.to_string();
                while let Some(p) = prev.get(&cursor) {
                    path.push(p.clone());
                    cursor = p.clone();
                }
                path.reverse();
                return Ok(path);
            }
            if cost > best.get(&node).copied().unwrap_or(f64::INFINITY) {
                continue;
            }
            if let Some(neighbors) = adjacency.get(&node) {
                for (next, weight) in neighbors {
                    let step = 1.0 / weight.max(f64::EPSILON);
                    let candidate = cost + step;
                    if candidate < best.get(next).copied().unwrap_or(f64::INFINITY) {
                        best.insert(next.clone(), candidate);
                        prev.insert(next.clone(), node.clone());
                        heap.push(State {
                            cost: candidate,
                            node: next.clone(),
                        });
                    }
                }
            }
        }

        Err(RoutingError::NoPath {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Whether any edge touches the endpoint.
    fn touches(&self, endpoint: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.from == endpoint || e.to == endpoint)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Point-in-time edge listing, sorted for stable reporting output.
    pub fn snapshot(&self) -> RoutingSnapshot {
        let mut edges: Vec<RoutingEdge> = self.edges.iter().map(|e| e.value().clone()).collect();
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        RoutingSnapshot {
            edges,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> RoutingGraph {
        RoutingGraph::new(RoutingConfig::default())
    }

    #[test]
    fn test_edge_created_at_baseline() {
        let g = graph();
        g.record_outcome("planner", "fork/low", true);
        let w = g.weight("planner", "fork/low").unwrap();
        assert!(w > RoutingConfig::default().baseline_weight);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_five_successes_raise_weight_above_baseline() {
        let g = graph();
        for _ in 0..5 {
            g.record_outcome("a", "b", true);
        }
        assert!(g.weight("a", "b").unwrap() > RoutingConfig::default().baseline_weight);
    }

    #[test]
    fn test_five_failures_drop_weight_below_baseline() {
        let g = graph();
        for _ in 0..5 {
            g.record_outcome("a", "b", false);
        }
        assert!(g.weight("a", "b").unwrap() < RoutingConfig::default().baseline_weight);
    }

    #[test]
    fn test_prune_removes_only_low_water_edges() {
        let g = graph();
        for _ in 0..10 {
            g.record_outcome("a", "weak", false);
        }
        g.record_outcome("a", "healthy", true);

        let summary = g.prune();
        assert_eq!(summary.pruned, vec![("a".to_string(), "weak".to_string())]);
        assert!(g.weight("a", "weak").is_none());
        assert!(g.weight("a", "healthy").is_some());
        assert_eq!(summary.remaining, 1);
    }

    #[test]
    fn test_highway_marking_is_informational() {
        let g = graph();
        for _ in 0..12 {
            g.record_outcome("a", "b", true);
        }
        let summary = g.prune();
        assert_eq!(summary.highways, vec![("a".to_string(), "b".to_string())]);

        let snapshot = g.snapshot();
        assert_eq!(snapshot.edges[0].status, EdgeStatus::Highway);
        // Still routable exactly as before.
        assert_eq!(g.best_path("a", "b").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_best_path_prefers_reinforced_route() {
        let g = graph();
        // Two-hop route, heavily reinforced.
        for _ in 0..8 {
            g.record_outcome("src", "mid", true);
            g.record_outcome("mid", "dst", true);
        }
        // Direct route, repeatedly failing.
        for _ in 0..8 {
            g.record_outcome("src", "dst", false);
        }

        let path = g.best_path("src", "dst").unwrap();
        assert_eq!(path, vec!["src", "mid", "dst"]);
    }

    #[test]
    fn test_best_path_disconnected() {
        let g = graph();
        g.record_outcome("a", "b", true);
        g.record_outcome("c", "d", true);

        assert!(matches!(
            g.best_path("a", "d"),
            Err(RoutingError::NoPath { .. })
        ));
    }

    #[test]
    fn test_concurrent_outcomes_do_not_lose_updates() {
        use std::sync::Arc;
        let g = Arc::new(graph());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let g = Arc::clone(&g);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    g.record_outcome("a", "b", true);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let edge = g.snapshot().edges.into_iter().next().unwrap();
        assert_eq!(edge.successes, 800);
    }

    #[test]
    fn test_snapshot_sorted() {
        let g = graph();
        g.record_outcome("b", "c", true);
        g.record_outcome("a", "z", true);
        let snap = g.snapshot();
        assert_eq!(snap.edges[0].from, "a");
        assert_eq!(snap.edges[1].from, "b");
    }
}
