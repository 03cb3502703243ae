//! Firewall port: source address blocking.

use crate::traits::{BlockOutcome, ConnectorError, ConnectorResult, MockBehavior};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Blocks and unblocks source addresses.
#[async_trait]
pub trait FirewallConnector: Send + Sync {
    /// Blocks an address for `duration_secs`, citing `reason`.
    async fn block_ip(
        &self,
        ip: &str,
        duration_secs: u64,
        reason: &str,
    ) -> ConnectorResult<BlockOutcome>;

    /// Removes a block.
    async fn unblock_ip(&self, ip: &str) -> ConnectorResult<()>;
}

/// In-memory firewall mock with failure injection.
#[derive(Default)]
pub struct MockFirewallConnector {
    blocked: Arc<RwLock<HashMap<String, BlockOutcome>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
}

impl MockFirewallConnector {
    /// Creates a mock that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the failure-injection behavior.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Addresses currently blocked, for test verification.
    pub async fn blocked_ips(&self) -> Vec<String> {
        self.blocked.read().await.keys().cloned().collect()
    }

    async fn gate(&self) -> ConnectorResult<()> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.behavior.read().await.check(call)
    }
}

#[async_trait]
impl FirewallConnector for MockFirewallConnector {
    async fn block_ip(
        &self,
        ip: &str,
        duration_secs: u64,
        reason: &str,
    ) -> ConnectorResult<BlockOutcome> {
        self.gate().await?;
        info!(ip, duration_secs, reason, "mock firewall: blocking");
        let outcome = BlockOutcome {
            ip: ip.to_string(),
            blocked_until: Utc::now() + Duration::seconds(duration_secs as i64),
            rule_ref: format!("mock-fw-{ip}"),
        };
        self.blocked
            .write()
            .await
            .insert(ip.to_string(), outcome.clone());
        Ok(outcome)
    }

    async fn unblock_ip(&self, ip: &str) -> ConnectorResult<()> {
        self.gate().await?;
        self.blocked
            .write()
            .await
            .remove(ip)
            .map(|_| ())
            .ok_or_else(|| ConnectorError::NotFound(format!("no block for {ip}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_block_and_unblock() {
        let firewall = MockFirewallConnector::new();
        firewall.block_ip("203.0.113.7", 3600, "brute force").await.unwrap();
        assert_eq!(firewall.blocked_ips().await, vec!["203.0.113.7".to_string()]);

        firewall.unblock_ip("203.0.113.7").await.unwrap();
        assert!(firewall.blocked_ips().await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let firewall = MockFirewallConnector::new();
        firewall
            .set_behavior(MockBehavior::AlwaysFail("fw api down".into()))
            .await;
        assert!(firewall.block_ip("203.0.113.7", 60, "x").await.is_err());
        assert!(firewall.blocked_ips().await.is_empty());
    }
}
