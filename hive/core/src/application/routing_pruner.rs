// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Routing Pruner - Background task for edge decay housekeeping
//!
//! Periodically sweeps the routing graph, removing edges that decayed below
//! the low-water mark and flagging highways, then publishes the outcome so
//! report tooling can track graph hygiene over time.

use crate::domain::events::HiveEvent;
use crate::domain::routing::RoutingGraph;
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

/// Configuration for the routing pruner.
#[derive(Debug, Clone)]
pub struct RoutingPrunerConfig {
    /// How often to run the prune sweep.
    pub interval: Duration,

    /// Whether pruning is enabled.
    pub enabled: bool,
}

impl Default for RoutingPrunerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            enabled: true,
        }
    }
}

/// Routing graph pruner - background task.
pub struct RoutingPruner {
    routing: Arc<RoutingGraph>,
    bus: Arc<EventBus>,
    config: RoutingPrunerConfig,
    shutdown_token: tokio_util::sync::CancellationToken,
}

impl RoutingPruner {
    pub fn new(
        routing: Arc<RoutingGraph>,
        bus: Arc<EventBus>,
        config: RoutingPrunerConfig,
    ) -> Self {
        Self {
            routing,
            bus,
            config,
            shutdown_token: tokio_util::sync::CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown.
    pub fn shutdown_token(&self) -> tokio_util::sync::CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the pruner background task.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("Routing pruner is disabled");
            return;
        }

        info!(
            interval_seconds = self.config.interval.as_secs(),
            "Starting routing pruner background task"
        );

        let mut tick = interval(self.config.interval);
        // The first tick fires immediately; skip it so a freshly started
        // engine is not pruned before any outcomes arrive.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running routing prune cycle");
                    self.prune_cycle();
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping routing pruner");
                    break;
                }
            }
        }
    }

    /// Execute a single prune cycle.
    pub fn prune_cycle(&self) {
        let summary = self.routing.prune();

        info!(
            pruned = summary.pruned.len(),
            highways = summary.highways.len(),
            remaining = summary.remaining,
            "Routing prune cycle completed"
        );

        self.bus.publish_event(&HiveEvent::EdgesPruned {
            pruned: summary.pruned.len(),
            highways: summary.highways.len(),
            remaining: summary.remaining,
            pruned_at: Utc::now(),
        });
    }
}
