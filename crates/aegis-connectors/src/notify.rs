//! Mock implementation of the core notification port.
//!
//! The trait itself lives in `aegis_core::alert` because the alert
//! dispatcher consumes it; this crate supplies the test double.

use aegis_core::alert::{AlertMessage, Notifier, NotifyError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Recording notifier with per-channel failure injection.
#[derive(Default)]
pub struct MockNotifier {
    sent: Arc<RwLock<Vec<(String, AlertMessage)>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl MockNotifier {
    /// Creates a mock where every channel succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes one channel ("email", "chat", "sms", "page") fail.
    pub async fn fail_channel(&self, channel: &str) {
        self.failing.write().await.insert(channel.to_string());
    }

    /// Messages sent so far as (channel, message) pairs.
    pub async fn sent(&self) -> Vec<(String, AlertMessage)> {
        self.sent.read().await.clone()
    }

    /// Number of messages accepted by one channel.
    pub async fn sent_on(&self, channel: &str) -> usize {
        self.sent
            .read()
            .await
            .iter()
            .filter(|(c, _)| c == channel)
            .count()
    }

    async fn deliver(&self, channel: &str, message: &AlertMessage) -> Result<(), NotifyError> {
        if self.failing.read().await.contains(channel) {
            return Err(NotifyError::Unavailable(format!("{channel} gateway down")));
        }
        self.sent
            .write()
            .await
            .push((channel.to_string(), message.clone()));
        Ok(())
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_email(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        self.deliver("email", message).await
    }

    async fn send_chat(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        self.deliver("chat", message).await
    }

    async fn send_sms(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        self.deliver("sms", message).await
    }

    async fn send_page(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        self.deliver("page", message).await
    }
}
