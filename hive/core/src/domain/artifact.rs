// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Artifact Aggregate (ADR-118)
//!
//! Defines the immutable, content-addressed record produced by hive rounds:
//!
//! - [`Artifact`] — aggregate root; append-only, never mutated after insert
//!   (except the incrementally maintained `spawn_count`, owned by the ledger).
//! - [`ArtifactId`] — SHA-256 of the canonical serialization of
//!   `(parent_ids, payload)`. Because the id derives from the parent set, the
//!   lineage graph is acyclic by construction.
//! - [`ArtifactPayload`] — tagged union over the payload kinds the engine
//!   actually produces, with an `Opaque` escape hatch for forward compatibility.
//!
//! See AGENTS.md §Lineage Ledger Context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Content hash identifying an [`Artifact`].
///
/// Lowercase hex encoding of the SHA-256 digest of the artifact's canonical
/// serialization. Two inserts with identical payload and parents always yield
/// the same id, which is what makes ledger inserts idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Compute the id for a payload + parent set.
    ///
    /// Canonical form is JSON with lexicographically ordered object keys
    /// (serde_json's default `Map` is BTreeMap-backed) and no insignificant
    /// whitespace.
    pub fn compute(payload: &ArtifactPayload, parent_ids: &[ArtifactId]) -> Self {
        let bytes = canonical_bytes(payload, parent_ids);
        let digest = Sha256::digest(&bytes);
        Self(hex::encode(digest))
    }

    /// Construct from a pre-computed hex digest (e.g. when rehydrating from
    /// the artifact store). No validation beyond ownership of the string.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical serialization input for content addressing.
///
/// Field order is fixed by the struct definition; object keys inside the
/// payload are sorted by serde_json's BTreeMap-backed `Map`.
#[derive(Serialize)]
struct CanonicalRecord<'a> {
    parent_ids: &'a [ArtifactId],
    payload: &'a ArtifactPayload,
}

fn canonical_bytes(payload: &ArtifactPayload, parent_ids: &[ArtifactId]) -> Vec<u8> {
    // Serialization of these types cannot fail: no non-string map keys, no
    // non-finite floats reach this path (scores are not part of identity).
    serde_json::to_vec(&CanonicalRecord {
        parent_ids,
        payload,
    })
    .unwrap_or_default()
}

/// Typed payload union (ADR-118).
///
/// The engine produces a closed set of payload kinds; anything else arrives
/// through `Opaque` so external producers stay forward compatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactPayload {
    /// Round-seeding input provided by the caller.
    Seed {
        label: String,
        content: Value,
    },

    /// Fused output of a swarm round.
    Synthesis {
        /// Fork indexes that contributed to the fusion, ascending.
        contributors: Vec<u32>,
        /// Index of the consensus champion among the contributors.
        champion: u32,
        /// Merged payload content.
        content: Value,
    },

    /// Marker committed by a round with zero surviving forks. Keeps lineage
    /// depth accounting consistent; never skipped.
    EmptyRound {
        reason: String,
    },

    /// Output of a reduced-width diagnostic round issued while recovering.
    Diagnostic {
        probe_count: u32,
        content: Value,
    },

    /// Caller-defined content the ledger treats as opaque.
    Opaque(Value),
}

impl ArtifactPayload {
    /// Stable label used in logs and routing endpoints.
    pub fn kind(&self) -> &'static str {
        match self {
            ArtifactPayload::Seed { .. } => "seed",
            ArtifactPayload::Synthesis { .. } => "synthesis",
            ArtifactPayload::EmptyRound { .. } => "empty_round",
            ArtifactPayload::Diagnostic { .. } => "diagnostic",
            ArtifactPayload::Opaque(_) => "opaque",
        }
    }
}

/// Quality/novelty metric vector attached to committed artifacts.
///
/// All axes are in `[0, 1]`, higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArtifactScore {
    pub continuity: f64,
    pub novelty: f64,
    pub regression_pass_rate: f64,
}

impl ArtifactScore {
    pub fn new(continuity: f64, novelty: f64, regression_pass_rate: f64) -> Self {
        Self {
            continuity: continuity.clamp(0.0, 1.0),
            novelty: novelty.clamp(0.0, 1.0),
            regression_pass_rate: regression_pass_rate.clamp(0.0, 1.0),
        }
    }
}

/// Immutable, content-addressed lineage record.
///
/// # Invariants
///
/// - `id == ArtifactId::compute(&payload, &parent_ids)`.
/// - `depth == 0` iff `parent_ids` is empty, else `max(parent.depth) + 1`.
/// - `root` is the artifact's own id for roots, otherwise inherited from the
///   first parent's root.
/// - `spawn_count` is derived (number of children) and maintained by the
///   ledger; callers never set it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub root: ArtifactId,
    pub parent_ids: Vec<ArtifactId>,
    pub depth: u64,
    pub spawn_count: u64,
    pub created_at: DateTime<Utc>,
    pub payload: ArtifactPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ArtifactScore>,
}

impl Artifact {
    /// Whether this artifact is a lineage root.
    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_is_deterministic() {
        let payload = ArtifactPayload::Seed {
            label: "genesis".to_string(),
            content: json!({"b": 2, "a": 1}),
        };
        let a = ArtifactId::compute(&payload, &[]);
        let b = ArtifactId::compute(&payload, &[]);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_id_depends_on_parents() {
        let payload = ArtifactPayload::Opaque(json!("x"));
        let root = ArtifactId::compute(&payload, &[]);
        let child = ArtifactId::compute(&payload, std::slice::from_ref(&root));
        assert_ne!(root, child);
    }

    #[test]
    fn test_id_depends_on_payload() {
        let a = ArtifactId::compute(&ArtifactPayload::Opaque(json!({"v": 1})), &[]);
        let b = ArtifactId::compute(&ArtifactPayload::Opaque(json!({"v": 2})), &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_order_does_not_change_id() {
        // serde_json object keys are sorted, so construction order is
        // irrelevant to the canonical form.
        let a = ArtifactId::compute(&ArtifactPayload::Opaque(json!({"a": 1, "b": 2})), &[]);
        let b = ArtifactId::compute(&ArtifactPayload::Opaque(json!({"b": 2, "a": 1})), &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_score_clamps() {
        let score = ArtifactScore::new(1.5, -0.2, 0.5);
        assert_eq!(score.continuity, 1.0);
        assert_eq!(score.novelty, 0.0);
        assert_eq!(score.regression_pass_rate, 0.5);
    }

    #[test]
    fn test_payload_kind_labels() {
        assert_eq!(
            ArtifactPayload::EmptyRound {
                reason: "all forks timed out".to_string()
            }
            .kind(),
            "empty_round"
        );
        assert_eq!(ArtifactPayload::Opaque(json!(null)).kind(), "opaque");
    }

    #[test]
    fn test_short_id_prefix() {
        let id = ArtifactId::compute(&ArtifactPayload::Opaque(json!(1)), &[]);
        assert_eq!(id.short().len(), 12);
        assert!(id.as_str().starts_with(id.short()));
    }
}
