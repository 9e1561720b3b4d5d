// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Ledger Service
//!
//! Durable insert pipeline around the in-memory [`LineageLedger`]:
//!
//! 1. Stage the artifact (validates parents, computes the content hash).
//! 2. Persist the staged record to the [`ArtifactStore`]. A write failure
//!    aborts here — the fatal path — and nothing has been committed.
//! 3. Commit the staged record to the in-memory ledger.
//! 4. Publish `ArtifactInserted` on the event bus.
//!
//! Queries go straight to the ledger; only mutation is routed through the
//! service.

use crate::domain::artifact::{Artifact, ArtifactId, ArtifactPayload, ArtifactScore};
use crate::domain::events::HiveEvent;
use crate::domain::ledger::{LedgerError, LedgerIssue, LineageLedger};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::storage::{ArtifactStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum LedgerServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Store I/O failure on write. Fatal for the current insert; the
    /// underlying error is surfaced unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct LedgerService {
    ledger: Arc<LineageLedger>,
    store: Arc<dyn ArtifactStore>,
    bus: Arc<EventBus>,
}

impl LedgerService {
    pub fn new(
        ledger: Arc<LineageLedger>,
        store: Arc<dyn ArtifactStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self { ledger, store, bus }
    }

    pub fn ledger(&self) -> &Arc<LineageLedger> {
        &self.ledger
    }

    /// Insert an artifact durably.
    ///
    /// Idempotent for identical `(payload, parent_ids)`: re-inserting returns
    /// the original artifact and leaves both the store and the parents'
    /// spawn counters untouched.
    #[instrument(skip_all, fields(parents = parent_ids.len()))]
    pub async fn insert(
        &self,
        payload: ArtifactPayload,
        parent_ids: &[ArtifactId],
        score: Option<ArtifactScore>,
    ) -> Result<Artifact, LedgerServiceError> {
        let staged = self.ledger.stage(payload, parent_ids, score)?;

        if let Some(existing) = self.ledger.get(&staged.id) {
            return Ok(existing);
        }

        self.store.persist(&staged).await?;
        let artifact = self.ledger.restore(staged)?;

        self.bus.publish_event(&HiveEvent::ArtifactInserted {
            artifact_id: artifact.id.clone(),
            depth: artifact.depth,
            payload_kind: artifact.payload.kind().to_string(),
            inserted_at: artifact.created_at,
        });

        Ok(artifact)
    }

    /// Rebuild the in-memory ledger from the store. Returns the number of
    /// artifacts restored.
    pub async fn rehydrate(&self) -> Result<usize, LedgerServiceError> {
        let records = self.store.load_all().await?;
        let mut restored = 0;
        for record in records {
            self.ledger.restore(record)?;
            restored += 1;
        }
        info!(restored, "Ledger rehydrated from store");
        Ok(restored)
    }

    /// Run a full consistency sweep and publish the outcome.
    pub fn validate(&self) -> Vec<LedgerIssue> {
        let issues = self.ledger.validate();
        self.bus.publish_event(&HiveEvent::LedgerValidated {
            artifacts: self.ledger.len(),
            issues: issues.len(),
            validated_at: Utc::now(),
        });
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::BusConfig;
    use crate::infrastructure::storage::MemoryArtifactStore;
    use serde_json::json;

    fn service() -> (LedgerService, Arc<MemoryArtifactStore>, Arc<EventBus>) {
        let store = Arc::new(MemoryArtifactStore::new());
        let bus = Arc::new(EventBus::new(BusConfig::default()));
        let service = LedgerService::new(
            Arc::new(LineageLedger::new()),
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
            Arc::clone(&bus),
        );
        (service, store, bus)
    }

    #[tokio::test]
    async fn test_insert_persists_and_publishes() {
        let (service, store, bus) = service();
        let mut sub = bus.subscribe("ledger.artifact_inserted");

        let artifact = service
            .insert(ArtifactPayload::Opaque(json!({"v": 1})), &[], None)
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let envelope = sub.recv().await.unwrap();
        assert_eq!(envelope.payload["artifact_id"], json!(artifact.id.as_str()));
    }

    #[tokio::test]
    async fn test_reinsert_leaves_single_document() {
        let (service, store, _bus) = service();
        let payload = ArtifactPayload::Opaque(json!("same"));

        let first = service.insert(payload.clone(), &[], None).await.unwrap();
        let second = service.insert(payload, &[], None).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_parent_surfaces() {
        let (service, store, _bus) = service();
        let ghost = ArtifactId::from_hex("ee".repeat(32));
        let err = service
            .insert(ArtifactPayload::Opaque(json!(1)), &[ghost], None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerServiceError::Ledger(LedgerError::UnknownParent(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_rehydrate_round_trip() {
        let (service, store, _bus) = service();
        let root = service
            .insert(ArtifactPayload::Opaque(json!("root")), &[], None)
            .await
            .unwrap();
        service
            .insert(ArtifactPayload::Opaque(json!("child")), &[root.id.clone()], None)
            .await
            .unwrap();

        let bus = Arc::new(EventBus::new(BusConfig::default()));
        let replica = LedgerService::new(
            Arc::new(LineageLedger::new()),
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
            bus,
        );
        assert_eq!(replica.rehydrate().await.unwrap(), 2);
        assert!(replica.validate().is_empty());
    }

    #[tokio::test]
    async fn test_validate_publishes_summary() {
        let (service, _store, bus) = service();
        let mut sub = bus.subscribe("ledger.validated");
        service
            .insert(ArtifactPayload::Opaque(json!(1)), &[], None)
            .await
            .unwrap();

        let issues = service.validate();
        assert!(issues.is_empty());
        let envelope = sub.recv().await.unwrap();
        assert_eq!(envelope.payload["artifacts"], json!(1));
        assert_eq!(envelope.payload["issues"], json!(0));
    }
}
