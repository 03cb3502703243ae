//! Detection rule definitions.
//!
//! A rule pairs an incident type and severity with a check that is either
//! stateless (signature matching against the current event) or stateful
//! (threshold counting over the event buffer within a time window). Custom
//! predicate rules are supported for checks neither shape covers; a custom
//! predicate that returns an error is treated as a non-match by the engine.

use crate::event::SecurityEvent;
use crate::incident::{IncidentType, Severity};
use chrono::Duration;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a custom rule predicate.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Predicate failed: {0}")]
    Predicate(String),
}

/// Which field of the current event a signature rule scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureField {
    Payload,
    Endpoint,
    UserAgent,
}

/// Which per-event key a threshold rule groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBy {
    /// Group by the event's source.
    Source,
    /// Group by the acting user; events without a user never match.
    User,
}

/// Signature of a custom predicate over (current event, buffer snapshot).
pub type CustomPredicate =
    Arc<dyn Fn(&SecurityEvent, &[SecurityEvent]) -> Result<bool, RuleError> + Send + Sync>;

/// The matching logic of a rule.
#[derive(Clone)]
pub enum RuleCheck {
    /// Stateless: the pattern matches any of the listed fields of the
    /// current event.
    Signature {
        fields: Vec<SignatureField>,
        pattern: Regex,
    },
    /// Stateful: at least `threshold` buffered events of `event_type`
    /// sharing the current event's key within `window` of the current
    /// event's timestamp. The buffer snapshot includes the current event.
    Threshold {
        event_type: String,
        key: KeyBy,
        threshold: usize,
        window: Duration,
    },
    /// Arbitrary predicate over (event, buffer snapshot).
    Custom(CustomPredicate),
}

impl std::fmt::Debug for RuleCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleCheck::Signature { fields, pattern } => f
                .debug_struct("Signature")
                .field("fields", fields)
                .field("pattern", &pattern.as_str())
                .finish(),
            RuleCheck::Threshold {
                event_type,
                key,
                threshold,
                window,
            } => f
                .debug_struct("Threshold")
                .field("event_type", event_type)
                .field("key", key)
                .field("threshold", threshold)
                .field("window", window)
                .finish(),
            RuleCheck::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A detection rule. Rules are loaded once at engine construction and can be
/// toggled at runtime via `enabled`.
#[derive(Debug, Clone)]
pub struct SecurityRule {
    /// Stable identifier, recorded on every incident the rule raises.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Incident type raised on a match.
    pub incident_type: IncidentType,
    /// Severity assigned to raised incidents.
    pub severity: Severity,
    /// Description copied onto raised incidents.
    pub description: String,
    /// The matching logic.
    pub check: RuleCheck,
    /// Disabled rules are skipped entirely.
    pub enabled: bool,
}

impl SecurityRule {
    /// Creates an enabled rule.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        incident_type: IncidentType,
        severity: Severity,
        description: impl Into<String>,
        check: RuleCheck,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            incident_type,
            severity,
            description: description.into(),
            check,
            enabled: true,
        }
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Evaluates the rule against the current event and a buffer snapshot.
    pub fn matches(
        &self,
        event: &SecurityEvent,
        buffer: &[SecurityEvent],
    ) -> Result<bool, RuleError> {
        match &self.check {
            RuleCheck::Signature { fields, pattern } => {
                Ok(fields.iter().any(|field| {
                    let value = match field {
                        SignatureField::Payload => event.payload.as_deref(),
                        SignatureField::Endpoint => event.endpoint.as_deref(),
                        SignatureField::UserAgent => event.user_agent.as_deref(),
                    };
                    value.is_some_and(|v| pattern.is_match(v))
                }))
            }
            RuleCheck::Threshold {
                event_type,
                key,
                threshold,
                window,
            } => {
                let current_key = match key {
                    KeyBy::Source => Some(event.source.as_str()),
                    KeyBy::User => event.user_id.as_deref(),
                };
                let Some(current_key) = current_key else {
                    return Ok(false);
                };
                let cutoff = event.timestamp - *window;
                let count = buffer
                    .iter()
                    .filter(|e| e.event_type == *event_type && e.timestamp >= cutoff)
                    .filter(|e| match key {
                        KeyBy::Source => e.source == current_key,
                        KeyBy::User => e.user_id.as_deref() == Some(current_key),
                    })
                    .count();
                Ok(count >= *threshold)
            }
            RuleCheck::Custom(predicate) => predicate(event, buffer),
        }
    }
}

/// The stock rule set: brute force, rate abuse, data exfiltration, SQL
/// injection, and XSS detection.
pub fn default_rules() -> Vec<SecurityRule> {
    vec![
        SecurityRule::new(
            "rule-brute-force",
            "Repeated authentication failures",
            IncidentType::BruteForce,
            Severity::High,
            "5 or more failed authentications from one source within 5 minutes",
            RuleCheck::Threshold {
                event_type: "auth_failure".to_string(),
                key: KeyBy::Source,
                threshold: 5,
                window: Duration::minutes(5),
            },
        ),
        SecurityRule::new(
            "rule-rate-abuse",
            "Request volume abuse",
            IncidentType::RateLimitAbuse,
            Severity::Medium,
            "1000 or more requests from one source within 60 seconds",
            RuleCheck::Threshold {
                event_type: "http_request".to_string(),
                key: KeyBy::Source,
                threshold: 1000,
                window: Duration::seconds(60),
            },
        ),
        SecurityRule::new(
            "rule-data-exfiltration",
            "Bulk data access",
            IncidentType::DataExfiltration,
            Severity::High,
            "100 or more data-access events by one actor within 1 hour",
            RuleCheck::Threshold {
                event_type: "data_access".to_string(),
                key: KeyBy::User,
                threshold: 100,
                window: Duration::hours(1),
            },
        ),
        SecurityRule::new(
            "rule-sql-injection",
            "SQL injection signature",
            IncidentType::SqlInjection,
            Severity::Critical,
            "SQL injection pattern in request payload",
            RuleCheck::Signature {
                fields: vec![SignatureField::Payload, SignatureField::Endpoint],
                pattern: Regex::new(
                    r#"(?i)('|%27)\s*(or|and)\s+[^=]*=|union\s+select|;\s*drop\s+table|--\s|/\*.*\*/"#,
                )
                .expect("static regex"),
            },
        ),
        SecurityRule::new(
            "rule-xss",
            "Cross-site scripting signature",
            IncidentType::CrossSiteScripting,
            Severity::High,
            "Script injection pattern in request payload",
            RuleCheck::Signature {
                fields: vec![SignatureField::Payload],
                pattern: Regex::new(r"(?i)<script[\s>]|javascript:|on(error|load|click)\s*=")
                    .expect("static regex"),
            },
        ),
    ]
}
