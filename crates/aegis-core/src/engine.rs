//! The detection engine: event ingestion and rule evaluation.
//!
//! `process_event` is safe to call from many tasks at once. Buffer mutation
//! (append, eviction) happens under a single write lock; rule evaluation
//! runs against a cloned snapshot so it never holds the lock.

use crate::buffer::{BufferConfig, EventBuffer};
use crate::event::SecurityEvent;
use crate::incident::SecurityIncident;
use crate::rule::{default_rules, SecurityRule};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Configuration for the detection engine.
#[derive(Debug, Clone, Default)]
pub struct DetectionConfig {
    /// Retention settings for the event buffer.
    pub buffer: BufferConfig,
}

/// Evaluates detection rules against the event stream.
#[derive(Clone)]
pub struct DetectionEngine {
    rules: Arc<RwLock<Vec<SecurityRule>>>,
    buffer: Arc<RwLock<EventBuffer>>,
}

impl DetectionEngine {
    /// Creates an engine with an explicit rule set. Rules are evaluated in
    /// the order given here.
    pub fn new(config: DetectionConfig, rules: Vec<SecurityRule>) -> Self {
        Self {
            rules: Arc::new(RwLock::new(rules)),
            buffer: Arc::new(RwLock::new(EventBuffer::new(config.buffer))),
        }
    }

    /// Creates an engine with the stock rule set.
    pub fn with_default_rules(config: DetectionConfig) -> Self {
        Self::new(config, default_rules())
    }

    /// Ingests one event and returns every incident it raised.
    ///
    /// The event is appended to the buffer first, so threshold rules see it
    /// in their window counts. A rule whose predicate errors is logged and
    /// treated as a non-match; it never aborts the other rules or the call.
    /// Expired buffer entries are evicted after evaluation.
    #[instrument(skip(self, event), fields(event_type = %event.event_type, source = %event.source))]
    pub async fn process_event(&self, event: SecurityEvent) -> Vec<SecurityIncident> {
        let snapshot = {
            let mut buffer = self.buffer.write().await;
            buffer.push(event.clone());
            buffer.snapshot()
        };

        let mut incidents = Vec::new();
        let rules = self.rules.read().await;
        for rule in rules.iter().filter(|r| r.enabled) {
            match rule.matches(&event, &snapshot) {
                Ok(true) => {
                    debug!(rule_id = %rule.id, "rule matched");
                    incidents.push(SecurityIncident::from_rule_match(
                        &rule.id,
                        rule.incident_type,
                        rule.severity,
                        &rule.description,
                        event.clone(),
                    ));
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(rule_id = %rule.id, error = %err, "rule evaluation failed, treating as non-match");
                }
            }
        }
        drop(rules);

        let evicted = self.buffer.write().await.evict_expired(Utc::now());
        if evicted > 0 {
            debug!(evicted, "evicted expired buffer entries");
        }

        incidents
    }

    /// Enables or disables a rule by id. Returns false if no rule matched.
    pub async fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> bool {
        let mut rules = self.rules.write().await;
        match rules.iter_mut().find(|r| r.id == rule_id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Current number of buffered events.
    pub async fn buffer_len(&self) -> usize {
        self.buffer.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::{IncidentType, Severity};
    use crate::rule::{KeyBy, RuleCheck, RuleError};
    use chrono::Duration;
    use std::sync::Arc as StdArc;

    fn engine_with(rules: Vec<SecurityRule>) -> DetectionEngine {
        DetectionEngine::new(DetectionConfig::default(), rules)
    }

    #[tokio::test]
    async fn test_no_rules_means_no_incidents_and_buffer_grows() {
        let engine = engine_with(Vec::new());
        let incidents = engine
            .process_event(SecurityEvent::new("gw", "http_request"))
            .await;
        assert!(incidents.is_empty());
        assert_eq!(engine.buffer_len().await, 1);
    }

    #[tokio::test]
    async fn test_disabled_rule_is_skipped() {
        let rule = SecurityRule::new(
            "rule-any",
            "Match everything",
            IncidentType::SuspiciousActivity,
            Severity::Low,
            "always fires",
            RuleCheck::Custom(StdArc::new(|_, _| Ok(true))),
        )
        .with_enabled(false);

        let engine = engine_with(vec![rule]);
        let incidents = engine.process_event(SecurityEvent::new("x", "y")).await;
        assert!(incidents.is_empty());
    }

    #[tokio::test]
    async fn test_rule_error_does_not_abort_other_rules() {
        let broken = SecurityRule::new(
            "rule-broken",
            "Errors out",
            IncidentType::SuspiciousActivity,
            Severity::Low,
            "always errors",
            RuleCheck::Custom(StdArc::new(|_, _| {
                Err(RuleError::Predicate("boom".into()))
            })),
        );
        let firing = SecurityRule::new(
            "rule-fires",
            "Match everything",
            IncidentType::SuspiciousActivity,
            Severity::Low,
            "always fires",
            RuleCheck::Custom(StdArc::new(|_, _| Ok(true))),
        );

        let engine = engine_with(vec![broken, firing]);
        let incidents = engine.process_event(SecurityEvent::new("x", "y")).await;
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].rule_id, "rule-fires");
    }

    #[tokio::test]
    async fn test_brute_force_fires_on_fifth_event_only() {
        let engine = DetectionEngine::with_default_rules(DetectionConfig::default());
        let mut produced = Vec::new();
        for i in 0..5 {
            let event = SecurityEvent::new("203.0.113.7", "auth_failure")
                .with_timestamp(Utc::now() - Duration::seconds(120 - i * 25));
            produced.push(engine.process_event(event).await);
        }

        for early in &produced[..4] {
            assert!(early.is_empty(), "fired before reaching the threshold");
        }
        assert_eq!(produced[4].len(), 1);
        let incident = &produced[4][0];
        assert_eq!(incident.incident_type, IncidentType::BruteForce);
        assert_eq!(incident.severity, Severity::High);
        assert_eq!(incident.source, "203.0.113.7");
    }

    #[tokio::test]
    async fn test_old_events_evicted_after_processing() {
        let config = DetectionConfig {
            buffer: crate::buffer::BufferConfig {
                max_age: Duration::minutes(5),
                max_len: 1000,
            },
        };
        let engine = DetectionEngine::new(config, Vec::new());

        let stale = SecurityEvent::new("a", "auth_failure")
            .with_timestamp(Utc::now() - Duration::minutes(10));
        engine.process_event(stale).await;
        // Stale entry was evicted at the end of its own ingestion pass.
        assert_eq!(engine.buffer_len().await, 0);

        engine.process_event(SecurityEvent::new("b", "auth_failure")).await;
        assert_eq!(engine.buffer_len().await, 1);
    }

    #[tokio::test]
    async fn test_set_rule_enabled() {
        let engine = DetectionEngine::with_default_rules(DetectionConfig::default());
        assert!(engine.set_rule_enabled("rule-xss", false).await);
        assert!(!engine.set_rule_enabled("rule-does-not-exist", false).await);

        let hit = SecurityEvent::new("gw", "http_request")
            .with_payload("<script>alert(1)</script>");
        assert!(engine.process_event(hit).await.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_rule_keyed_by_user() {
        let rule = SecurityRule::new(
            "rule-user-burst",
            "User event burst",
            IncidentType::DataExfiltration,
            Severity::High,
            "3 data accesses by one user in a minute",
            RuleCheck::Threshold {
                event_type: "data_access".to_string(),
                key: KeyBy::User,
                threshold: 3,
                window: Duration::seconds(60),
            },
        );
        let engine = engine_with(vec![rule]);

        for _ in 0..2 {
            let e = SecurityEvent::new("db", "data_access").with_user_id("u-7");
            assert!(engine.process_event(e).await.is_empty());
        }
        let e = SecurityEvent::new("db", "data_access").with_user_id("u-7");
        assert_eq!(engine.process_event(e).await.len(), 1);
    }
}
