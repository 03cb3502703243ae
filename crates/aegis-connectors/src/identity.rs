//! Identity port: account disabling, credential resets, token revocation,
//! and permission audits.

use crate::traits::{ConnectorResult, MockBehavior, PermissionGrant};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// User-management operations the response engine can take.
#[async_trait]
pub trait IdentityConnector: Send + Sync {
    /// Disables an account, citing `reason`.
    async fn disable_user(&self, user_id: &str, reason: &str) -> ConnectorResult<()>;

    /// Forces a credential reset for an account.
    async fn reset_credentials(&self, user_id: &str) -> ConnectorResult<()>;

    /// Revokes every active token for an account. Returns the count revoked.
    async fn revoke_tokens(&self, user_id: &str) -> ConnectorResult<u64>;

    /// Returns the account's current permission grants.
    async fn audit_permissions(&self, user_id: &str) -> ConnectorResult<Vec<PermissionGrant>>;
}

/// In-memory identity mock with failure injection.
#[derive(Default)]
pub struct MockIdentityConnector {
    disabled: Arc<RwLock<HashSet<String>>>,
    token_counts: Arc<RwLock<HashMap<String, u64>>>,
    grants: Arc<RwLock<HashMap<String, Vec<PermissionGrant>>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
}

impl MockIdentityConnector {
    /// Creates a mock that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the failure-injection behavior.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Seeds the active token count for a user.
    pub async fn seed_tokens(&self, user_id: &str, count: u64) {
        self.token_counts
            .write()
            .await
            .insert(user_id.to_string(), count);
    }

    /// Seeds permission grants for a user.
    pub async fn seed_grants(&self, user_id: &str, grants: Vec<PermissionGrant>) {
        self.grants.write().await.insert(user_id.to_string(), grants);
    }

    /// Whether an account was disabled, for test verification.
    pub async fn is_disabled(&self, user_id: &str) -> bool {
        self.disabled.read().await.contains(user_id)
    }

    async fn gate(&self) -> ConnectorResult<()> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.behavior.read().await.check(call)
    }
}

#[async_trait]
impl IdentityConnector for MockIdentityConnector {
    async fn disable_user(&self, user_id: &str, reason: &str) -> ConnectorResult<()> {
        self.gate().await?;
        info!(user_id, reason, "mock identity: disabling user");
        self.disabled.write().await.insert(user_id.to_string());
        Ok(())
    }

    async fn reset_credentials(&self, user_id: &str) -> ConnectorResult<()> {
        self.gate().await?;
        info!(user_id, "mock identity: resetting credentials");
        Ok(())
    }

    async fn revoke_tokens(&self, user_id: &str) -> ConnectorResult<u64> {
        self.gate().await?;
        let count = self
            .token_counts
            .write()
            .await
            .remove(user_id)
            .unwrap_or(0);
        info!(user_id, count, "mock identity: revoked tokens");
        Ok(count)
    }

    async fn audit_permissions(&self, user_id: &str) -> ConnectorResult<Vec<PermissionGrant>> {
        self.gate().await?;
        Ok(self
            .grants
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disable_and_revoke() {
        let identity = MockIdentityConnector::new();
        identity.seed_tokens("u-9", 4).await;

        identity.disable_user("u-9", "exfiltration").await.unwrap();
        assert!(identity.is_disabled("u-9").await);
        assert_eq!(identity.revoke_tokens("u-9").await.unwrap(), 4);
        // Second revocation finds nothing left.
        assert_eq!(identity.revoke_tokens("u-9").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fail_after_lets_early_calls_through() {
        let identity = MockIdentityConnector::new();
        identity
            .set_behavior(MockBehavior::FailAfter {
                calls: 1,
                message: "idp outage".into(),
            })
            .await;

        assert!(identity.disable_user("u-1", "x").await.is_ok());
        assert!(identity.disable_user("u-2", "x").await.is_err());
    }
}
