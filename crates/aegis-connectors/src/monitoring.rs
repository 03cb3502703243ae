//! Monitoring port: enhanced monitoring and log search.
//!
//! Log search feeds evidence collection; enhanced monitoring is one of the
//! remediation action types.

use crate::traits::{ConnectorResult, LogQuery, LogRecord, MockBehavior};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Monitoring and log-search operations.
#[async_trait]
pub trait MonitoringConnector: Send + Sync {
    /// Turns on enhanced monitoring for a target in the given mode.
    async fn enable_enhanced_monitoring(
        &self,
        target: &str,
        mode: &str,
        duration_secs: u64,
    ) -> ConnectorResult<()>;

    /// Searches logs; results feed evidence collection.
    async fn query_logs(&self, query: &LogQuery) -> ConnectorResult<Vec<LogRecord>>;
}

/// In-memory monitoring mock with seedable logs and failure injection.
#[derive(Default)]
pub struct MockMonitoringConnector {
    logs: Arc<RwLock<HashMap<String, Vec<LogRecord>>>>,
    monitored: Arc<RwLock<Vec<(String, String)>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
}

impl MockMonitoringConnector {
    /// Creates a mock that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the failure-injection behavior.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Seeds log lines for one log source.
    pub async fn seed_logs(&self, source: &str, lines: &[&str]) {
        let records = lines
            .iter()
            .map(|line| LogRecord {
                timestamp: Utc::now(),
                source: source.to_string(),
                line: line.to_string(),
            })
            .collect();
        self.logs.write().await.insert(source.to_string(), records);
    }

    /// (target, mode) pairs that had monitoring enabled.
    pub async fn monitored_targets(&self) -> Vec<(String, String)> {
        self.monitored.read().await.clone()
    }

    async fn gate(&self) -> ConnectorResult<()> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.behavior.read().await.check(call)
    }
}

#[async_trait]
impl MonitoringConnector for MockMonitoringConnector {
    async fn enable_enhanced_monitoring(
        &self,
        target: &str,
        mode: &str,
        duration_secs: u64,
    ) -> ConnectorResult<()> {
        self.gate().await?;
        info!(target, mode, duration_secs, "mock monitoring enabled");
        self.monitored
            .write()
            .await
            .push((target.to_string(), mode.to_string()));
        Ok(())
    }

    async fn query_logs(&self, query: &LogQuery) -> ConnectorResult<Vec<LogRecord>> {
        self.gate().await?;
        let logs = self.logs.read().await;
        let records = logs.get(&query.source).cloned().unwrap_or_default();
        let filtered: Vec<LogRecord> = records
            .into_iter()
            .filter(|r| {
                query
                    .filter
                    .as_deref()
                    .map(|f| r.line.contains(f))
                    .unwrap_or(true)
            })
            .take(query.limit)
            .collect();
        Ok(filtered)
    }
}
