//! Evidence storage port.

use crate::traits::{ConnectorResult, MockBehavior};
use aegis_core::evidence::EvidenceItem;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Persists evidence items. Items are append-only; there is no delete.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Stores one evidence item.
    async fn store(&self, item: &EvidenceItem) -> ConnectorResult<()>;
}

/// In-memory evidence store with failure injection.
#[derive(Default)]
pub struct MockEvidenceStore {
    items: Arc<RwLock<Vec<EvidenceItem>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
}

impl MockEvidenceStore {
    /// Creates a mock that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the failure-injection behavior.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// All stored items, in insertion order.
    pub async fn items(&self) -> Vec<EvidenceItem> {
        self.items.read().await.clone()
    }

    /// Whether an item with the given id was stored.
    pub async fn contains(&self, id: Uuid) -> bool {
        self.items.read().await.iter().any(|i| i.id == id)
    }
}

#[async_trait]
impl EvidenceStore for MockEvidenceStore {
    async fn store(&self, item: &EvidenceItem) -> ConnectorResult<()> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.behavior.read().await.check(call)?;
        debug!(evidence_id = %item.id, evidence_type = %item.evidence_type, "mock evidence stored");
        self.items.write().await.push(item.clone());
        Ok(())
    }
}
