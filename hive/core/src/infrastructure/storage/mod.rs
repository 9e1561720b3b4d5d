// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Artifact Store Port
//!
//! Durable export surface for the lineage ledger. The in-memory ledger stays
//! the source of truth for queries; the store persists each artifact exactly
//! once and can rehydrate a ledger at startup.
//!
//! Write failure is the engine's single fatal condition: it aborts the
//! current insert and surfaces the underlying error unchanged.

pub mod local;

use crate::domain::artifact::{Artifact, ArtifactId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

pub use local::LocalArtifactStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Artifact store I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact record failed to (de)serialize: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only persistence port for artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist one artifact. Persisting an id that is already present is a
    /// no-op (content addressing guarantees the bytes match).
    async fn persist(&self, artifact: &Artifact) -> Result<(), StoreError>;

    /// Load every persisted artifact, ordered by depth so a replay can
    /// restore parents before children.
    async fn load_all(&self) -> Result<Vec<Artifact>, StoreError>;

    async fn contains(&self, id: &ArtifactId) -> Result<bool, StoreError>;
}

/// In-memory store for tests and ephemeral single-shot runs.
#[derive(Default)]
pub struct MemoryArtifactStore {
    records: RwLock<HashMap<ArtifactId, Artifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn persist(&self, artifact: &Artifact) -> Result<(), StoreError> {
        self.records
            .write()
            .entry(artifact.id.clone())
            .or_insert_with(|| artifact.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Artifact>, StoreError> {
        let mut all: Vec<Artifact> = self.records.read().values().cloned().collect();
        all.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn contains(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        Ok(self.records.read().contains_key(id))
    }
}
