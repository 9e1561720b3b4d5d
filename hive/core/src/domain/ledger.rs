// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Lineage Ledger (ADR-118)
//!
//! Content-addressed, append-only DAG of [`Artifact`]s. The ledger is the
//! ground truth store for everything the hive engine produces.
//!
//! ## Concurrency
//!
//! Inserts are serialized per content hash (DashMap shard entry) but proceed
//! concurrently across unrelated hashes. Ancestor `spawn_count` increments use
//! atomic counters so concurrent children of the same parent never lose
//! updates. Queries take no long-lived locks.
//!
//! ## Append-only contract
//!
//! Artifacts are never mutated after insert (the `spawn_count` counter is the
//! single ledger-owned exception) and never deleted. Re-inserting an identical
//! record is idempotent and returns the original artifact.

use crate::domain::artifact::{Artifact, ArtifactId, ArtifactPayload, ArtifactScore};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced by ledger operations. Always propagated, never swallowed.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unknown parent artifact {0}")]
    UnknownParent(ArtifactId),

    #[error("Artifact not found: {0}")]
    NotFound(ArtifactId),

    #[error("Inserting {0} would create a lineage cycle")]
    Cycle(ArtifactId),

    #[error("Content hash collision for {0}: existing record differs")]
    Duplicate(ArtifactId),

    #[error("Corrupt artifact record: {0}")]
    CorruptRecord(String),
}

/// Typed consistency issue reported by [`LineageLedger::validate`].
///
/// Issues are collected, not thrown, so one corrupt artifact never blocks
/// inspection of the rest of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerIssue {
    OrphanedParent {
        artifact: ArtifactId,
        missing_parent: ArtifactId,
    },
    DepthMismatch {
        artifact: ArtifactId,
        stored: u64,
        expected: u64,
    },
    SpawnCountMismatch {
        artifact: ArtifactId,
        stored: u64,
        expected: u64,
    },
    RootMismatch {
        artifact: ArtifactId,
        stored: ArtifactId,
        expected: ArtifactId,
    },
    CycleDetected {
        artifact: ArtifactId,
    },
}

/// Internal record: the immutable artifact plus its live spawn counter.
struct StoredArtifact {
    artifact: Artifact,
    spawn_count: AtomicU64,
}

impl StoredArtifact {
    /// Clone the artifact with the current spawn counter folded in.
    fn materialize(&self) -> Artifact {
        let mut artifact = self.artifact.clone();
        artifact.spawn_count = self.spawn_count.load(Ordering::SeqCst);
        artifact
    }
}

/// Content-addressed lineage DAG (aggregate root of the Lineage Ledger
/// Context, ADR-118).
pub struct LineageLedger {
    artifacts: DashMap<ArtifactId, Arc<StoredArtifact>>,
    /// Child index, maintained on insert so descendant queries avoid full scans.
    children: DashMap<ArtifactId, Vec<ArtifactId>>,
}

impl LineageLedger {
    pub fn new() -> Self {
        Self {
            artifacts: DashMap::new(),
            children: DashMap::new(),
        }
    }

    /// Insert a new artifact.
    ///
    /// Fails with [`LedgerError::UnknownParent`] if any parent is absent (no
    /// forward references). The cycle check is defense in depth: ids derive
    /// from parents, so a cycle is impossible by construction, but the
    /// invariant is re-validated anyway. Re-inserting an identical record is
    /// idempotent: the original artifact is returned and parent counters are
    /// not incremented a second time.
    pub fn insert(
        &self,
        payload: ArtifactPayload,
        parent_ids: &[ArtifactId],
        score: Option<ArtifactScore>,
    ) -> Result<Artifact, LedgerError> {
        // Deduplicate while preserving caller order.
        let mut seen = HashSet::new();
        let parent_ids: Vec<ArtifactId> = parent_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();

        // Resolve parents before taking the entry for the new id, so no two
        // map shards are ever held at once.
        let mut parents = Vec::with_capacity(parent_ids.len());
        for parent_id in &parent_ids {
            let stored = self
                .artifacts
                .get(parent_id)
                .map(|entry| Arc::clone(entry.value()))
                .ok_or_else(|| LedgerError::UnknownParent(parent_id.clone()))?;
            parents.push(stored);
        }

        let id = ArtifactId::compute(&payload, &parent_ids);

        // Defense in depth: no parent's ancestor set may contain the
        // prospective id.
        for parent_id in &parent_ids {
            if self.ancestor_set(parent_id).contains(&id) {
                return Err(LedgerError::Cycle(id));
            }
        }

        let depth = parents
            .iter()
            .map(|p| p.artifact.depth)
            .max()
            .map(|d| d + 1)
            .unwrap_or(0);

        let root = parents
            .first()
            .map(|p| p.artifact.root.clone())
            .unwrap_or_else(|| id.clone());

        let inserted = match self.artifacts.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let stored = existing.get();
                if stored.artifact.payload == payload && stored.artifact.parent_ids == parent_ids {
                    debug!(artifact = %id.short(), "Idempotent re-insert, returning existing artifact");
                    return Ok(stored.materialize());
                }
                // Unreachable without a SHA-256 collision; surfaced rather
                // than silently overwritten.
                warn!(artifact = %id.short(), "Content hash collision on insert");
                return Err(LedgerError::Duplicate(id));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let artifact = Artifact {
                    id: id.clone(),
                    root,
                    parent_ids: parent_ids.clone(),
                    depth,
                    spawn_count: 0,
                    created_at: Utc::now(),
                    payload,
                    score,
                };
                let stored = Arc::new(StoredArtifact {
                    artifact,
                    spawn_count: AtomicU64::new(0),
                });
                slot.insert(Arc::clone(&stored));
                stored
            }
        };

        // New artifact is in place; bump each parent exactly once.
        for (parent_id, parent) in parent_ids.iter().zip(&parents) {
            parent.spawn_count.fetch_add(1, Ordering::SeqCst);
            self.children
                .entry(parent_id.clone())
                .or_default()
                .push(id.clone());
        }

        metrics::counter!("hive_ledger_artifacts_inserted").increment(1);
        debug!(
            artifact = %id.short(),
            depth,
            parents = parent_ids.len(),
            "Artifact inserted"
        );

        Ok(inserted.materialize())
    }

    /// Compute the artifact an insert would produce, without mutating the
    /// ledger.
    ///
    /// Callers that must persist durably before committing (the write-ahead
    /// ordering in the ledger service) stage first, persist, then commit the
    /// staged record via [`LineageLedger::restore`].
    pub fn stage(
        &self,
        payload: ArtifactPayload,
        parent_ids: &[ArtifactId],
        score: Option<ArtifactScore>,
    ) -> Result<Artifact, LedgerError> {
        let mut seen = HashSet::new();
        let parent_ids: Vec<ArtifactId> = parent_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();

        let mut max_depth = None;
        let mut root = None;
        for parent_id in &parent_ids {
            let parent = self
                .artifacts
                .get(parent_id)
                .ok_or_else(|| LedgerError::UnknownParent(parent_id.clone()))?;
            max_depth = Some(max_depth.unwrap_or(0).max(parent.artifact.depth));
            if root.is_none() {
                root = Some(parent.artifact.root.clone());
            }
        }

        let id = ArtifactId::compute(&payload, &parent_ids);
        for parent_id in &parent_ids {
            if self.ancestor_set(parent_id).contains(&id) {
                return Err(LedgerError::Cycle(id));
            }
        }

        Ok(Artifact {
            root: root.unwrap_or_else(|| id.clone()),
            id,
            parent_ids,
            depth: max_depth.map(|d| d + 1).unwrap_or(0),
            spawn_count: 0,
            created_at: Utc::now(),
            payload,
            score,
        })
    }

    /// Restore an artifact rehydrated from the store, preserving its original
    /// timestamp and score. Parents must already be restored (replay in depth
    /// order). The content hash is recomputed and verified.
    pub fn restore(&self, artifact: Artifact) -> Result<Artifact, LedgerError> {
        let expected = ArtifactId::compute(&artifact.payload, &artifact.parent_ids);
        if expected != artifact.id {
            return Err(LedgerError::CorruptRecord(format!(
                "stored id {} does not match recomputed hash {}",
                artifact.id, expected
            )));
        }

        let mut parents = Vec::with_capacity(artifact.parent_ids.len());
        for parent_id in &artifact.parent_ids {
            let stored = self
                .artifacts
                .get(parent_id)
                .map(|entry| Arc::clone(entry.value()))
                .ok_or_else(|| LedgerError::UnknownParent(parent_id.clone()))?;
            parents.push(stored);
        }

        let id = artifact.id.clone();
        let parent_ids = artifact.parent_ids.clone();
        match self.artifacts.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                return Ok(existing.get().materialize());
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let mut artifact = artifact;
                artifact.spawn_count = 0;
                slot.insert(Arc::new(StoredArtifact {
                    artifact,
                    spawn_count: AtomicU64::new(0),
                }));
            }
        }

        for (parent_id, parent) in parent_ids.iter().zip(&parents) {
            parent.spawn_count.fetch_add(1, Ordering::SeqCst);
            self.children
                .entry(parent_id.clone())
                .or_default()
                .push(id.clone());
        }

        self.get(&id).ok_or(LedgerError::NotFound(id))
    }

    /// Fetch a single artifact with its current spawn counter.
    pub fn get(&self, id: &ArtifactId) -> Option<Artifact> {
        self.artifacts.get(id).map(|entry| entry.materialize())
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.artifacts.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// All artifacts, unordered. Intended for validation sweeps, migration
    /// passes and external report tooling, not hot paths.
    pub fn all(&self) -> Vec<Artifact> {
        self.artifacts
            .iter()
            .map(|entry| entry.materialize())
            .collect()
    }

    /// BFS from `id` toward the roots. The starting artifact is not included.
    pub fn ancestors(&self, id: &ArtifactId) -> Result<Vec<Artifact>, LedgerError> {
        let start = self
            .artifacts
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::NotFound(id.clone()))?;

        let mut out = Vec::new();
        let mut visited: HashSet<ArtifactId> = HashSet::new();
        let mut queue: VecDeque<ArtifactId> = start.artifact.parent_ids.iter().cloned().collect();

        while let Some(next) = queue.pop_front() {
            if !visited.insert(next.clone()) {
                continue;
            }
            if let Some(entry) = self.artifacts.get(&next) {
                queue.extend(entry.artifact.parent_ids.iter().cloned());
                out.push(entry.materialize());
            }
            // A missing ancestor is a consistency issue, reported by
            // `validate`, not a query failure.
        }

        Ok(out)
    }

    /// BFS from `id` through the child index. The starting artifact is not
    /// included.
    pub fn descendants(&self, id: &ArtifactId) -> Result<Vec<Artifact>, LedgerError> {
        if !self.artifacts.contains_key(id) {
            return Err(LedgerError::NotFound(id.clone()));
        }

        let mut out = Vec::new();
        let mut visited: HashSet<ArtifactId> = HashSet::new();
        let mut queue: VecDeque<ArtifactId> = self
            .children
            .get(id)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default();

        while let Some(next) = queue.pop_front() {
            if !visited.insert(next.clone()) {
                continue;
            }
            if let Some(entry) = self.artifacts.get(&next) {
                out.push(entry.materialize());
            }
            if let Some(grandchildren) = self.children.get(&next) {
                queue.extend(grandchildren.iter().cloned());
            }
        }

        Ok(out)
    }

    /// Full-ledger consistency sweep.
    ///
    /// Checks orphaned parent references, depth derivation, spawn counter
    /// accuracy, root inheritance, and (defense in depth) acyclicity. Returns
    /// every issue found rather than failing fast so batch tooling can report
    /// all problems at once.
    pub fn validate(&self) -> Vec<LedgerIssue> {
        let mut issues = Vec::new();

        // Recompute child counts from scratch; compare against the live
        // counters afterwards.
        let mut recounted: HashMap<ArtifactId, u64> = HashMap::new();

        let snapshot: Vec<Arc<StoredArtifact>> = self
            .artifacts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for stored in &snapshot {
            let artifact = &stored.artifact;
            let mut parent_depths = Vec::with_capacity(artifact.parent_ids.len());
            let mut expected_root = None;

            for parent_id in &artifact.parent_ids {
                *recounted.entry(parent_id.clone()).or_insert(0) += 1;
                match self.artifacts.get(parent_id) {
                    Some(parent) => {
                        parent_depths.push(parent.artifact.depth);
                        if expected_root.is_none() {
                            expected_root = Some(parent.artifact.root.clone());
                        }
                    }
                    None => issues.push(LedgerIssue::OrphanedParent {
                        artifact: artifact.id.clone(),
                        missing_parent: parent_id.clone(),
                    }),
                }
            }

            // Depth is only checkable when every parent resolved; an orphan
            // already produced its own issue.
            if parent_depths.len() == artifact.parent_ids.len() {
                let expected_depth = parent_depths.iter().max().map(|d| d + 1).unwrap_or(0);
                if artifact.depth != expected_depth {
                    issues.push(LedgerIssue::DepthMismatch {
                        artifact: artifact.id.clone(),
                        stored: artifact.depth,
                        expected: expected_depth,
                    });
                }

                let expected_root = expected_root.unwrap_or_else(|| artifact.id.clone());
                if artifact.root != expected_root {
                    issues.push(LedgerIssue::RootMismatch {
                        artifact: artifact.id.clone(),
                        stored: artifact.root.clone(),
                        expected: expected_root,
                    });
                }
            }
        }

        for stored in &snapshot {
            let artifact = &stored.artifact;
            let counted = recounted.get(&artifact.id).copied().unwrap_or(0);
            let live = stored.spawn_count.load(Ordering::SeqCst);
            if counted != live {
                issues.push(LedgerIssue::SpawnCountMismatch {
                    artifact: artifact.id.clone(),
                    stored: live,
                    expected: counted,
                });
            }
        }

        issues.extend(self.detect_cycles(&snapshot));
        issues
    }

    /// Iterative three-color DFS over parent edges.
    fn detect_cycles(&self, snapshot: &[Arc<StoredArtifact>]) -> Vec<LedgerIssue> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut colors: HashMap<ArtifactId, Color> = snapshot
            .iter()
            .map(|s| (s.artifact.id.clone(), Color::White))
            .collect();
        let mut issues = Vec::new();

        for stored in snapshot {
            let start = stored.artifact.id.clone();
            if colors.get(&start) != Some(&Color::White) {
                continue;
            }

            // (node, next-parent-index) stack frames.
            let mut stack: Vec<(ArtifactId, usize)> = vec![(start, 0)];
            while let Some((node, idx)) = stack.pop() {
                if idx == 0 {
                    colors.insert(node.clone(), Color::Gray);
                }
                let parent_ids = self
                    .artifacts
                    .get(&node)
                    .map(|e| e.artifact.parent_ids.clone())
                    .unwrap_or_default();

                if idx < parent_ids.len() {
                    let parent = parent_ids[idx].clone();
                    stack.push((node, idx + 1));
                    match colors.get(&parent) {
                        Some(Color::Gray) => issues.push(LedgerIssue::CycleDetected {
                            artifact: parent,
                        }),
                        Some(Color::White) => stack.push((parent, 0)),
                        _ => {}
                    }
                } else {
                    colors.insert(node, Color::Black);
                }
            }
        }

        issues
    }

    /// Ancestor id set for the cycle defense check.
    fn ancestor_set(&self, id: &ArtifactId) -> HashSet<ArtifactId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(next) = queue.pop_front() {
            if !visited.insert(next.clone()) {
                continue;
            }
            if let Some(entry) = self.artifacts.get(&next) {
                queue.extend(entry.artifact.parent_ids.iter().cloned());
            }
        }
        visited
    }
}

impl Default for LineageLedger {
    fn default() -> Self {
        Self::new()
    }
}
