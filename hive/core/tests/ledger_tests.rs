// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the lineage ledger, persistence and migration
//! tooling, exercised through the public crate surface the way external
//! report tooling consumes it.

use hive_core::application::ledger_service::LedgerService;
use hive_core::domain::artifact::{ArtifactId, ArtifactPayload, ArtifactScore};
use hive_core::domain::config::{BusConfig, HiveConfig};
use hive_core::domain::ledger::{LedgerError, LineageLedger};
use hive_core::domain::migration::{lineage_confidence, migrate_lineage};
use hive_core::infrastructure::event_bus::EventBus;
use hive_core::infrastructure::storage::{ArtifactStore, LocalArtifactStore};
use serde_json::json;
use std::sync::Arc;

fn opaque(value: serde_json::Value) -> ArtifactPayload {
    ArtifactPayload::Opaque(value)
}

#[test]
fn test_depth_invariant_over_diamond_graph() {
    let ledger = LineageLedger::new();
    let root = ledger.insert(opaque(json!("root")), &[], None).unwrap();
    let left = ledger
        .insert(opaque(json!("left")), &[root.id.clone()], None)
        .unwrap();
    let right = ledger
        .insert(opaque(json!("right")), &[root.id.clone()], None)
        .unwrap();
    let join = ledger
        .insert(
            opaque(json!("join")),
            &[left.id.clone(), right.id.clone()],
            None,
        )
        .unwrap();
    let tip = ledger
        .insert(opaque(json!("tip")), &[join.id.clone(), root.id.clone()], None)
        .unwrap();

    // depth == 0 iff no parents, else max(parent depth) + 1.
    for artifact in ledger.all() {
        if artifact.parent_ids.is_empty() {
            assert_eq!(artifact.depth, 0);
        } else {
            let expected = artifact
                .parent_ids
                .iter()
                .map(|p| ledger.get(p).unwrap().depth)
                .max()
                .unwrap()
                + 1;
            assert_eq!(artifact.depth, expected);
        }
    }
    assert_eq!(tip.depth, 3);

    // spawn_count matches a full recount for every artifact.
    let all = ledger.all();
    for artifact in &all {
        let recount = all
            .iter()
            .filter(|a| a.parent_ids.contains(&artifact.id))
            .count() as u64;
        assert_eq!(artifact.spawn_count, recount);
    }
    assert_eq!(ledger.get(&root.id).unwrap().spawn_count, 3);

    assert!(ledger.validate().is_empty());
}

#[test]
fn test_ancestors_of_tip_reach_every_root() {
    let ledger = LineageLedger::new();
    let a = ledger.insert(opaque(json!("a")), &[], None).unwrap();
    let b = ledger.insert(opaque(json!("b")), &[], None).unwrap();
    let merged = ledger
        .insert(opaque(json!("m")), &[a.id.clone(), b.id.clone()], None)
        .unwrap();

    let ancestors = ledger.ancestors(&merged.id).unwrap();
    let ids: Vec<&ArtifactId> = ancestors.iter().map(|x| &x.id).collect();
    assert!(ids.contains(&&a.id));
    assert!(ids.contains(&&b.id));

    // Roots carry their own id as lineage root; children inherit the first
    // parent's root.
    assert_eq!(merged.root, a.id);
}

#[tokio::test]
async fn test_service_pipeline_with_filesystem_store() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Arc::new(EventBus::new(BusConfig::default()));
    let store: Arc<dyn ArtifactStore> =
        Arc::new(LocalArtifactStore::new(dir.path()).unwrap());
    let service = LedgerService::new(Arc::new(LineageLedger::new()), store, Arc::clone(&bus));

    let root = service
        .insert(
            ArtifactPayload::Seed {
                label: "genesis".to_string(),
                content: json!({"epoch": 0}),
            },
            &[],
            Some(ArtifactScore::new(1.0, 0.2, 1.0)),
        )
        .await
        .unwrap();
    let child = service
        .insert(opaque(json!({"step": 1})), &[root.id.clone()], None)
        .await
        .unwrap();

    // Re-insert of identical content: same id, one document, one child count.
    let again = service
        .insert(opaque(json!({"step": 1})), &[root.id.clone()], None)
        .await
        .unwrap();
    assert_eq!(again.id, child.id);
    assert_eq!(service.ledger().get(&root.id).unwrap().spawn_count, 1);

    // A fresh process rehydrates the identical ledger from disk.
    let replica_store: Arc<dyn ArtifactStore> =
        Arc::new(LocalArtifactStore::new(dir.path()).unwrap());
    let replica = LedgerService::new(
        Arc::new(LineageLedger::new()),
        replica_store,
        Arc::new(EventBus::new(BusConfig::default())),
    );
    assert_eq!(replica.rehydrate().await.unwrap(), 2);

    let restored = replica.ledger().get(&child.id).unwrap();
    assert_eq!(restored.depth, 1);
    assert_eq!(restored.created_at, child.created_at);
    assert!(replica.validate().is_empty());
}

#[test]
fn test_unknown_parent_and_cycle_defense() {
    let ledger = LineageLedger::new();
    let ghost = ArtifactId::from_hex("aa".repeat(32));
    assert!(matches!(
        ledger.insert(opaque(json!(1)), &[ghost], None),
        Err(LedgerError::UnknownParent(_))
    ));

    // Acyclicity holds structurally: an artifact's id depends on its parent
    // set, so no insert can reference itself. Validate finds nothing.
    let root = ledger.insert(opaque(json!("r")), &[], None).unwrap();
    ledger
        .insert(opaque(json!("c")), &[root.id], None)
        .unwrap();
    assert!(ledger.validate().is_empty());
}

#[test]
fn test_migration_flags_low_confidence_for_review() {
    let ledger = LineageLedger::new();
    let anchor = ledger.insert(opaque(json!("anchor")), &[], None).unwrap();
    let legacy_a = ledger.insert(opaque(json!("legacy-a")), &[], None).unwrap();
    let legacy_b = ledger.insert(opaque(json!("legacy-b")), &[], None).unwrap();

    let report = migrate_lineage(&ledger, 0.7, |artifact| {
        if artifact.id == legacy_a.id {
            Some((anchor.id.clone(), 0.95))
        } else if artifact.id == legacy_b.id {
            Some((anchor.id.clone(), 0.4))
        } else {
            None
        }
    });

    assert_eq!(report.inferred.len(), 2);
    assert_eq!(report.needs_review, vec![legacy_b.id.clone()]);
    assert_eq!(report.unlinked, vec![anchor.id.clone()]);

    // Confidence scoring is pure and recomputable for any stored artifact.
    let score = lineage_confidence(&ledger, &ledger.get(&legacy_a.id).unwrap());
    assert!((0.0..=1.0).contains(&score));
}

#[test]
fn test_config_surface_round_trips() {
    let yaml = r#"
routing:
  baseline_weight: 1.0
  reinforcement_factor: 1.2
  decay_factor: 0.8
  prune_below: 0.3
  highway_above: 6.0
homeostat:
  synthesize_at: 2.0
  exploit_at: 3.0
  throttle_at: 3.5
  min_continuity: 0.9
  min_regression_pass: 0.9
  hysteresis_samples: 2
swarm:
  fork_count: 7
  round_timeout: 45s
store:
  base_path: /var/lib/hive/artifacts
"#;
    let config = HiveConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.swarm.fork_count, 7);
    assert_eq!(config.routing.highway_above, 6.0);
    assert_eq!(
        config.store.base_path.to_str().unwrap(),
        "/var/lib/hive/artifacts"
    );

    // Serialized form parses back identically.
    let round_tripped =
        HiveConfig::from_yaml_str(&serde_yaml::to_string(&config).unwrap()).unwrap();
    assert_eq!(round_tripped.swarm.fork_count, 7);
    assert_eq!(
        round_tripped.swarm.round_timeout,
        config.swarm.round_timeout
    );
}
