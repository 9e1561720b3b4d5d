// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Lineage Backfill & Confidence Scoring (ADR-118)
//!
//! Migration tooling for ledgers that predate parent tracking. A
//! caller-supplied inference function proposes a parent for each unlinked
//! artifact; the pass records the inferred edge together with its confidence
//! so low-confidence inferences can be flagged for manual review.
//!
//! Inferred edges are advisory output only. The pass never mutates stored
//! artifacts: content-addressed ids bake the parent set into the hash, so a
//! backfilled link lives beside the record, not inside it.

use crate::domain::artifact::{Artifact, ArtifactId, ArtifactPayload};
use crate::domain::ledger::LineageLedger;
use serde::Serialize;
use tracing::info;

/// One inferred lineage edge.
#[derive(Debug, Clone, Serialize)]
pub struct InferredEdge {
    pub artifact: ArtifactId,
    pub inferred_parent: ArtifactId,
    /// Inference confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Output of a [`migrate_lineage`] pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// Every edge the inference function proposed, in ledger scan order.
    pub inferred: Vec<InferredEdge>,
    /// Artifacts whose best inference fell below the review threshold.
    pub needs_review: Vec<ArtifactId>,
    /// Artifacts the inference function could not link at all.
    pub unlinked: Vec<ArtifactId>,
}

/// Backfill lineage for artifacts lacking parent links.
///
/// `infer` maps an artifact to an inferred parent id plus a confidence score;
/// proposals whose parent is absent from the ledger are discarded (and the
/// artifact reported unlinked) rather than invented.
pub fn migrate_lineage<F>(
    ledger: &LineageLedger,
    review_threshold: f64,
    mut infer: F,
) -> MigrationReport
where
    F: FnMut(&Artifact) -> Option<(ArtifactId, f64)>,
{
    let mut report = MigrationReport::default();

    let mut orphans: Vec<Artifact> = ledger
        .all()
        .into_iter()
        .filter(|a| a.parent_ids.is_empty())
        .collect();
    // Deterministic scan order regardless of map iteration.
    orphans.sort_by(|a, b| a.id.cmp(&b.id));

    for artifact in &orphans {
        match infer(artifact) {
            Some((parent, confidence)) if ledger.contains(&parent) && parent != artifact.id => {
                let confidence = confidence.clamp(0.0, 1.0);
                if confidence < review_threshold {
                    report.needs_review.push(artifact.id.clone());
                }
                report.inferred.push(InferredEdge {
                    artifact: artifact.id.clone(),
                    inferred_parent: parent,
                    confidence,
                });
            }
            _ => report.unlinked.push(artifact.id.clone()),
        }
    }

    info!(
        scanned = orphans.len(),
        inferred = report.inferred.len(),
        needs_review = report.needs_review.len(),
        unlinked = report.unlinked.len(),
        "Lineage backfill pass completed"
    );

    report
}

/// Pure lineage confidence score for an artifact, in `[0, 1]`.
///
/// Weighted combination of lineage completeness (are parents recorded and
/// resolvable), metadata richness (score vector present, payload carries
/// structured content) and payload kind. Recomputable at any time without
/// touching stored data.
pub fn lineage_confidence(ledger: &LineageLedger, artifact: &Artifact) -> f64 {
    // Lineage completeness: roots are complete by definition; children score
    // by the fraction of parents that resolve.
    let completeness = if artifact.parent_ids.is_empty() {
        if artifact.depth == 0 {
            1.0
        } else {
            0.0
        }
    } else {
        let resolved = artifact
            .parent_ids
            .iter()
            .filter(|p| ledger.contains(p))
            .count() as f64;
        resolved / artifact.parent_ids.len() as f64
    };

    let richness = {
        let mut r: f64 = 0.0;
        if artifact.score.is_some() {
            r += 0.6;
        }
        if !matches!(artifact.payload, ArtifactPayload::Opaque(serde_json::Value::Null)) {
            r += 0.4;
        }
        r
    };

    let kind_weight = match artifact.payload {
        ArtifactPayload::Synthesis { .. } => 1.0,
        ArtifactPayload::Seed { .. } => 0.9,
        ArtifactPayload::Diagnostic { .. } => 0.7,
        ArtifactPayload::EmptyRound { .. } => 0.5,
        ArtifactPayload::Opaque(_) => 0.4,
    };

    (0.5 * completeness + 0.3 * richness + 0.2 * kind_weight).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::ArtifactScore;
    use serde_json::json;

    fn seeded_ledger() -> (LineageLedger, ArtifactId, Vec<ArtifactId>) {
        let ledger = LineageLedger::new();
        let anchor = ledger
            .insert(
                ArtifactPayload::Seed {
                    label: "anchor".to_string(),
                    content: json!({"epoch": 0}),
                },
                &[],
                None,
            )
            .unwrap();
        let orphan_ids: Vec<ArtifactId> = (0..3)
            .map(|i| {
                ledger
                    .insert(ArtifactPayload::Opaque(json!({ "legacy": i })), &[], None)
                    .unwrap()
                    .id
            })
            .collect();
        (ledger, anchor.id, orphan_ids)
    }

    #[test]
    fn test_migrate_links_to_existing_parent() {
        let (ledger, anchor, orphans) = seeded_ledger();
        let report = migrate_lineage(&ledger, 0.5, |artifact| {
            if artifact.id == anchor {
                None
            } else {
                Some((anchor.clone(), 0.9))
            }
        });

        assert_eq!(report.inferred.len(), orphans.len());
        assert!(report.needs_review.is_empty());
        assert!(report.inferred.iter().all(|e| e.inferred_parent == anchor));
        // The anchor itself could not be linked.
        assert_eq!(report.unlinked, vec![anchor]);
    }

    #[test]
    fn test_low_confidence_flags_review() {
        let (ledger, anchor, _) = seeded_ledger();
        let report = migrate_lineage(&ledger, 0.6, |artifact| {
            if artifact.id == anchor {
                None
            } else {
                Some((anchor.clone(), 0.3))
            }
        });

        assert_eq!(report.needs_review.len(), 3);
        assert_eq!(report.inferred.len(), 3);
    }

    #[test]
    fn test_unknown_inferred_parent_discarded() {
        let (ledger, anchor, _) = seeded_ledger();
        let ghost = ArtifactId::from_hex("cd".repeat(32));
        let report = migrate_lineage(&ledger, 0.5, |artifact| {
            if artifact.id == anchor {
                None
            } else {
                Some((ghost.clone(), 0.99))
            }
        });

        assert!(report.inferred.is_empty());
        assert_eq!(report.unlinked.len(), 4);
    }

    #[test]
    fn test_confidence_root_with_score() {
        let ledger = LineageLedger::new();
        let artifact = ledger
            .insert(
                ArtifactPayload::Seed {
                    label: "s".to_string(),
                    content: json!({}),
                },
                &[],
                Some(ArtifactScore::new(1.0, 0.5, 1.0)),
            )
            .unwrap();

        let c = lineage_confidence(&ledger, &artifact);
        // completeness 1.0, richness 1.0, kind 0.9 → 0.5 + 0.3 + 0.18
        assert!((c - 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_degrades_for_bare_opaque() {
        let ledger = LineageLedger::new();
        let artifact = ledger
            .insert(ArtifactPayload::Opaque(serde_json::Value::Null), &[], None)
            .unwrap();

        let c = lineage_confidence(&ledger, &artifact);
        // completeness 1.0 (true root), richness 0.0, kind 0.4
        assert!((c - 0.58).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped_and_pure() {
        let (ledger, anchor, _) = seeded_ledger();
        let artifact = ledger.get(&anchor).unwrap();
        let first = lineage_confidence(&ledger, &artifact);
        let second = lineage_confidence(&ledger, &artifact);
        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first));
    }
}
