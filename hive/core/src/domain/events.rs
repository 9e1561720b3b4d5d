// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::artifact::ArtifactId;
use crate::domain::mode::SystemMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain events published on the hive event bus.
///
/// Topic names are stable strings so external subscribers (report tooling,
/// dashboards) can filter without deserializing the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HiveEvent {
    ArtifactInserted {
        artifact_id: ArtifactId,
        depth: u64,
        payload_kind: String,
        inserted_at: DateTime<Utc>,
    },
    RoundCompleted {
        round: u64,
        mode: SystemMode,
        artifact_id: ArtifactId,
        surviving_forks: usize,
        dispatched_forks: usize,
        completed_at: DateTime<Utc>,
    },
    RoundEmpty {
        round: u64,
        mode: SystemMode,
        artifact_id: ArtifactId,
        reason: String,
        completed_at: DateTime<Utc>,
    },
    EdgesPruned {
        pruned: usize,
        highways: usize,
        remaining: usize,
        pruned_at: DateTime<Utc>,
    },
    ModeChanged {
        from: SystemMode,
        to: SystemMode,
        changed_at: DateTime<Utc>,
    },
    LedgerValidated {
        artifacts: usize,
        issues: usize,
        validated_at: DateTime<Utc>,
    },
}

impl HiveEvent {
    /// Bus topic this event is published under.
    pub fn topic(&self) -> &'static str {
        match self {
            HiveEvent::ArtifactInserted { .. } => "ledger.artifact_inserted",
            HiveEvent::RoundCompleted { .. } => "swarm.round_completed",
            HiveEvent::RoundEmpty { .. } => "swarm.round_empty",
            HiveEvent::EdgesPruned { .. } => "routing.edges_pruned",
            HiveEvent::ModeChanged { .. } => "homeostat.mode_changed",
            HiveEvent::LedgerValidated { .. } => "ledger.validated",
        }
    }

    /// Default delivery urgency for this event kind, in `[0, 1]`.
    ///
    /// Urgency feeds trail accounting on the bus; it does not affect
    /// correctness of delivery.
    pub fn urgency(&self) -> f64 {
        match self {
            HiveEvent::ModeChanged { .. } => 0.9,
            HiveEvent::RoundEmpty { .. } => 0.8,
            HiveEvent::LedgerValidated { .. } => 0.6,
            HiveEvent::RoundCompleted { .. } => 0.5,
            HiveEvent::ArtifactInserted { .. } => 0.3,
            HiveEvent::EdgesPruned { .. } => 0.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics_are_stable() {
        let event = HiveEvent::ModeChanged {
            from: SystemMode::Explore,
            to: SystemMode::Synthesize,
            changed_at: Utc::now(),
        };
        assert_eq!(event.topic(), "homeostat.mode_changed");
    }

    #[test]
    fn test_events_round_trip_json() {
        let event = HiveEvent::EdgesPruned {
            pruned: 3,
            highways: 1,
            remaining: 10,
            pruned_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: HiveEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.topic(), event.topic());
    }
}
