//! Severity-tiered alert fan-out for new incidents.
//!
//! The dispatcher is best-effort: every channel failure is caught and logged
//! independently, one channel's failure never suppresses another's attempt,
//! and dispatch never returns an error to the caller.

use crate::incident::{SecurityIncident, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Error from a single notification channel.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Channel unavailable: {0}")]
    Unavailable(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Priority hint attached to outgoing alerts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    Low,
    Normal,
    Urgent,
}

/// The message sent over each channel for one incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    /// The incident being announced.
    pub incident_id: Uuid,
    /// Incident severity.
    pub severity: Severity,
    /// Short title.
    pub title: String,
    /// Full description.
    pub body: String,
    /// Delivery priority hint.
    pub priority: AlertPriority,
}

impl AlertMessage {
    /// Builds the alert message for an incident.
    pub fn for_incident(incident: &SecurityIncident) -> Self {
        let priority = match incident.severity {
            Severity::Critical => AlertPriority::Urgent,
            Severity::High => AlertPriority::Normal,
            Severity::Medium | Severity::Low => AlertPriority::Low,
        };
        Self {
            incident_id: incident.id,
            severity: incident.severity,
            title: format!(
                "[{}] {} from {}",
                incident.severity, incident.incident_type, incident.source
            ),
            body: incident.description.clone(),
            priority,
        }
    }
}

/// Notification port: one independent send operation per channel. Each
/// succeeds or fails on its own.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, message: &AlertMessage) -> Result<(), NotifyError>;
    async fn send_chat(&self, message: &AlertMessage) -> Result<(), NotifyError>;
    async fn send_sms(&self, message: &AlertMessage) -> Result<(), NotifyError>;
    async fn send_page(&self, message: &AlertMessage) -> Result<(), NotifyError>;
}

/// Channels selected for a given severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Email,
    Chat,
    Sms,
    Page,
}

/// Fans out a notification per new incident, tiered by severity.
#[derive(Clone)]
pub struct AlertDispatcher {
    notifier: std::sync::Arc<dyn Notifier>,
}

impl AlertDispatcher {
    /// Creates a dispatcher over the given notification port.
    pub fn new(notifier: std::sync::Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Dispatches the alert for one new incident. Returns the number of
    /// channels that accepted the message. Never fails.
    #[instrument(skip(self, incident), fields(incident_id = %incident.id, severity = %incident.severity))]
    pub async fn dispatch(&self, incident: &SecurityIncident) -> usize {
        let mut message = AlertMessage::for_incident(incident);
        let channels: &[Channel] = match incident.severity {
            Severity::Critical => &[Channel::Email, Channel::Chat, Channel::Sms, Channel::Page],
            Severity::High => &[Channel::Email, Channel::Chat],
            Severity::Medium => &[Channel::Chat],
            Severity::Low => {
                message.priority = AlertPriority::Low;
                &[Channel::Chat]
            }
        };

        let sends = channels.iter().map(|channel| {
            let notifier = self.notifier.clone();
            let message = message.clone();
            let channel = *channel;
            async move {
                let result = match channel {
                    Channel::Email => notifier.send_email(&message).await,
                    Channel::Chat => notifier.send_chat(&message).await,
                    Channel::Sms => notifier.send_sms(&message).await,
                    Channel::Page => notifier.send_page(&message).await,
                };
                (channel, result)
            }
        });

        let mut delivered = 0;
        for (channel, result) in futures::future::join_all(sends).await {
            match result {
                Ok(()) => {
                    debug!(?channel, "alert delivered");
                    delivered += 1;
                }
                Err(err) => {
                    warn!(?channel, error = %err, "alert channel failed");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SecurityEvent;
    use crate::incident::IncidentType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingNotifier {
        email: AtomicUsize,
        chat: AtomicUsize,
        sms: AtomicUsize,
        page: AtomicUsize,
        fail_email: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send_email(&self, _m: &AlertMessage) -> Result<(), NotifyError> {
            self.email.fetch_add(1, Ordering::SeqCst);
            if self.fail_email {
                Err(NotifyError::Unavailable("smtp down".into()))
            } else {
                Ok(())
            }
        }
        async fn send_chat(&self, _m: &AlertMessage) -> Result<(), NotifyError> {
            self.chat.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn send_sms(&self, _m: &AlertMessage) -> Result<(), NotifyError> {
            self.sms.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn send_page(&self, _m: &AlertMessage) -> Result<(), NotifyError> {
            self.page.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn incident(severity: Severity) -> SecurityIncident {
        SecurityIncident::from_rule_match(
            "rule-x",
            IncidentType::BruteForce,
            severity,
            "test incident",
            SecurityEvent::new("203.0.113.7", "auth_failure"),
        )
    }

    #[tokio::test]
    async fn test_critical_hits_every_channel() {
        let notifier = Arc::new(CountingNotifier::default());
        let dispatcher = AlertDispatcher::new(notifier.clone());

        let delivered = dispatcher.dispatch(&incident(Severity::Critical)).await;
        assert_eq!(delivered, 4);
        assert_eq!(notifier.email.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.chat.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.sms.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.page.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_high_hits_email_and_chat_only() {
        let notifier = Arc::new(CountingNotifier::default());
        let dispatcher = AlertDispatcher::new(notifier.clone());

        dispatcher.dispatch(&incident(Severity::High)).await;
        assert_eq!(notifier.email.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.chat.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.sms.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.page.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_channel_failure_does_not_suppress_others() {
        let notifier = Arc::new(CountingNotifier {
            fail_email: true,
            ..Default::default()
        });
        let dispatcher = AlertDispatcher::new(notifier.clone());

        let delivered = dispatcher.dispatch(&incident(Severity::High)).await;
        assert_eq!(delivered, 1);
        assert_eq!(notifier.email.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.chat.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_low_uses_low_priority_chat() {
        let notifier = Arc::new(CountingNotifier::default());
        let dispatcher = AlertDispatcher::new(notifier.clone());

        let delivered = dispatcher.dispatch(&incident(Severity::Low)).await;
        assert_eq!(delivered, 1);
        assert_eq!(notifier.chat.load(Ordering::SeqCst), 1);
    }
}
