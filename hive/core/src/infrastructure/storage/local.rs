// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Artifact Store
//!
//! Simple filesystem-based implementation of [`ArtifactStore`] for
//! single-node deployments and testing. One self-describing JSON document per
//! artifact, named by content hash, written once and never rewritten.
//!
//! **Limitations:**
//! - No multi-node sharing (documents only accessible on the local machine)
//! - No compaction; the directory grows with the ledger (append-only)
//! - Manual cleanup required if a deployment is abandoned mid-run

use crate::domain::artifact::{Artifact, ArtifactId};
use crate::infrastructure::storage::{ArtifactStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filesystem-backed artifact store.
#[derive(Debug)]
pub struct LocalArtifactStore {
    base_path: PathBuf,
}

impl LocalArtifactStore {
    /// Create the store, ensuring the base directory exists and is writable.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|source| StoreError::Io {
            path: base_path.clone(),
            source,
        })?;

        // Verify the directory is writable up front rather than failing on
        // the first insert.
        let probe = base_path.join(".hive-store-probe");
        std::fs::write(&probe, b"probe").map_err(|source| StoreError::Io {
            path: probe.clone(),
            source,
        })?;
        std::fs::remove_file(&probe).map_err(|source| StoreError::Io {
            path: probe.clone(),
            source,
        })?;

        Ok(Self { base_path })
    }

    fn document_path(&self, id: &ArtifactId) -> PathBuf {
        self.base_path.join(format!("{}.json", id.as_str()))
    }

    fn read_document(path: &Path) -> Result<Artifact, StoreError> {
        let raw = std::fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn persist(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let path = self.document_path(&artifact.id);
        if path.exists() {
            // Same id, same bytes; nothing to do.
            return Ok(());
        }

        let bytes = serde_json::to_vec_pretty(artifact)?;

        // Write-then-rename so a crashed write never leaves a truncated
        // document under the canonical name.
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, &bytes).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
        std::fs::rename(&staging, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(artifact = %artifact.id.short(), "Artifact persisted");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Artifact>, StoreError> {
        let entries = std::fs::read_dir(&self.base_path).map_err(|source| StoreError::Io {
            path: self.base_path.clone(),
            source,
        })?;

        let mut artifacts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.base_path.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            artifacts.push(Self::read_document(&path)?);
        }

        // Depth order so replay restores parents before children; id order
        // within a depth for determinism.
        artifacts.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.id.cmp(&b.id)));
        Ok(artifacts)
    }

    async fn contains(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        Ok(self.document_path(id).exists())
    }
}
