//! Endpoint port: host isolation, file quarantine, patching, backup, and
//! service restoration.

use crate::traits::{ConnectorResult, MockBehavior};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Host-level remediation operations.
#[async_trait]
pub trait EndpointConnector: Send + Sync {
    /// Isolates a system from the network.
    async fn isolate_system(&self, target: &str, reason: &str) -> ConnectorResult<()>;

    /// Quarantines a file on a system.
    async fn quarantine_file(&self, target: &str, path: &str) -> ConnectorResult<()>;

    /// Applies a patch to a system.
    async fn patch_vulnerability(&self, target: &str, patch_id: &str) -> ConnectorResult<()>;

    /// Snapshots data on a system before further remediation.
    async fn backup_data(&self, target: &str, scope: &str) -> ConnectorResult<()>;

    /// Restores a service on a system.
    async fn restore_service(&self, target: &str, service: &str) -> ConnectorResult<()>;
}

/// Record of one mock endpoint operation, for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointOp {
    pub op: String,
    pub target: String,
    pub detail: String,
}

/// In-memory endpoint mock with failure injection.
#[derive(Default)]
pub struct MockEndpointConnector {
    ops: Arc<RwLock<Vec<EndpointOp>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
}

impl MockEndpointConnector {
    /// Creates a mock that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the failure-injection behavior.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Operations performed so far, in order.
    pub async fn operations(&self) -> Vec<EndpointOp> {
        self.ops.read().await.clone()
    }

    async fn record(&self, op: &str, target: &str, detail: &str) -> ConnectorResult<()> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.behavior.read().await.check(call)?;
        info!(op, target, detail, "mock endpoint operation");
        self.ops.write().await.push(EndpointOp {
            op: op.to_string(),
            target: target.to_string(),
            detail: detail.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl EndpointConnector for MockEndpointConnector {
    async fn isolate_system(&self, target: &str, reason: &str) -> ConnectorResult<()> {
        self.record("isolate", target, reason).await
    }

    async fn quarantine_file(&self, target: &str, path: &str) -> ConnectorResult<()> {
        self.record("quarantine", target, path).await
    }

    async fn patch_vulnerability(&self, target: &str, patch_id: &str) -> ConnectorResult<()> {
        self.record("patch", target, patch_id).await
    }

    async fn backup_data(&self, target: &str, scope: &str) -> ConnectorResult<()> {
        self.record("backup", target, scope).await
    }

    async fn restore_service(&self, target: &str, service: &str) -> ConnectorResult<()> {
        self.record("restore", target, service).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_recorded_in_order() {
        let endpoint = MockEndpointConnector::new();
        endpoint.isolate_system("web-1", "exfiltration").await.unwrap();
        endpoint.backup_data("web-1", "full").await.unwrap();

        let ops = endpoint.operations().await;
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].op, "isolate");
        assert_eq!(ops[1].op, "backup");
    }

    #[tokio::test]
    async fn test_injected_failure_records_nothing() {
        let endpoint = MockEndpointConnector::new();
        endpoint
            .set_behavior(MockBehavior::AlwaysFail("edr unreachable".into()))
            .await;
        assert!(endpoint.isolate_system("web-1", "x").await.is_err());
        assert!(endpoint.operations().await.is_empty());
    }
}
