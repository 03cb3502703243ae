//! Incident data models and the canonical incident store.
//!
//! Incidents are created only by a detection rule match and progress through
//! a monotonic status lifecycle. `Resolved` and `FalsePositive` are terminal;
//! the store rejects any transition out of them.

use crate::event::SecurityEvent;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Severity of an incident, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Categories of incidents the detection rules can raise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    /// Repeated authentication failures from one source.
    BruteForce,
    /// Request volume abuse from one source.
    RateLimitAbuse,
    /// SQL injection signature in a request payload.
    SqlInjection,
    /// Cross-site scripting signature in a request payload.
    CrossSiteScripting,
    /// Bulk data access by one actor.
    DataExfiltration,
    /// Unexpected privilege or permission change.
    PrivilegeEscalation,
    /// Catch-all for custom rules.
    SuspiciousActivity,
}

impl std::fmt::Display for IncidentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentType::BruteForce => write!(f, "brute_force"),
            IncidentType::RateLimitAbuse => write!(f, "rate_limit_abuse"),
            IncidentType::SqlInjection => write!(f, "sql_injection"),
            IncidentType::CrossSiteScripting => write!(f, "cross_site_scripting"),
            IncidentType::DataExfiltration => write!(f, "data_exfiltration"),
            IncidentType::PrivilegeEscalation => write!(f, "privilege_escalation"),
            IncidentType::SuspiciousActivity => write!(f, "suspicious_activity"),
        }
    }
}

/// Lifecycle status of an incident.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Raised by a rule match, not yet looked at.
    Detected,
    /// Under investigation.
    Investigating,
    /// Confirmed as a real incident.
    Confirmed,
    /// Remediation in progress.
    Mitigating,
    /// Closed as resolved. Terminal.
    Resolved,
    /// Closed as a false positive. Terminal.
    FalsePositive,
}

impl IncidentStatus {
    /// Whether no further transitions may leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::FalsePositive)
    }
}

/// A detected security incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityIncident {
    /// Unique identifier, generated at detection time.
    pub id: Uuid,
    /// Category of the incident.
    pub incident_type: IncidentType,
    /// Severity assigned by the matching rule.
    pub severity: Severity,
    /// When the incident was detected.
    pub timestamp: DateTime<Utc>,
    /// Source carried over from the triggering event.
    pub source: String,
    /// Human-readable description from the matching rule.
    pub description: String,
    /// Identifier of the rule that raised this incident.
    pub rule_id: String,
    /// The event that completed the rule match.
    pub triggering_event: SecurityEvent,
    /// Additional detection context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Current lifecycle status.
    pub status: IncidentStatus,
    /// Analyst the incident is assigned to.
    pub assigned_to: Option<String>,
    /// Stamped on transition into `Resolved`.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Stamped when a critical response action forced escalation.
    pub escalated_at: Option<DateTime<Utc>>,
}

impl SecurityIncident {
    /// Creates an incident from a rule match. Only detection calls this.
    pub fn from_rule_match(
        rule_id: &str,
        incident_type: IncidentType,
        severity: Severity,
        description: &str,
        triggering_event: SecurityEvent,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_type,
            severity,
            timestamp: Utc::now(),
            source: triggering_event.source.clone(),
            description: description.to_string(),
            rule_id: rule_id.to_string(),
            triggering_event,
            metadata: HashMap::new(),
            status: IncidentStatus::Detected,
            assigned_to: None,
            resolved_at: None,
            escalated_at: None,
        }
    }
}

/// Errors from incident store operations.
#[derive(Error, Debug)]
pub enum IncidentStoreError {
    #[error("Incident not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid transition from terminal status {from:?} to {to:?} for incident {id}")]
    TerminalStatus {
        id: Uuid,
        from: IncidentStatus,
        to: IncidentStatus,
    },
}

/// Canonical map of live incidents, safe for concurrent use.
///
/// Updates to different incidents proceed independently; updates to the same
/// incident serialize on the write lock. Last-write-wins is acceptable
/// because statuses are monotonic and terminal states reject exits.
#[derive(Clone, Default)]
pub struct IncidentStore {
    incidents: Arc<RwLock<HashMap<Uuid, SecurityIncident>>>,
}

impl IncidentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a newly detected incident.
    pub async fn insert(&self, incident: SecurityIncident) {
        debug!(incident_id = %incident.id, incident_type = %incident.incident_type, "storing incident");
        self.incidents.write().await.insert(incident.id, incident);
    }

    /// Updates an incident's status, optionally assigning it.
    ///
    /// Rejects unknown ids and any transition away from a terminal status.
    /// Transition into `Resolved` stamps `resolved_at`.
    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: IncidentStatus,
        assigned_to: Option<String>,
    ) -> Result<SecurityIncident, IncidentStoreError> {
        let mut incidents = self.incidents.write().await;
        let incident = incidents.get_mut(&id).ok_or(IncidentStoreError::NotFound(id))?;

        if incident.status.is_terminal() {
            return Err(IncidentStoreError::TerminalStatus {
                id,
                from: incident.status,
                to: new_status,
            });
        }

        incident.status = new_status;
        if let Some(assignee) = assigned_to {
            incident.assigned_to = Some(assignee);
        }
        if new_status == IncidentStatus::Resolved {
            incident.resolved_at = Some(Utc::now());
        }

        info!(incident_id = %id, status = ?new_status, "incident status updated");
        Ok(incident.clone())
    }

    /// Marks the incident escalated, stamping `escalated_at` once.
    pub async fn mark_escalated(&self, id: Uuid) -> Result<(), IncidentStoreError> {
        let mut incidents = self.incidents.write().await;
        let incident = incidents.get_mut(&id).ok_or(IncidentStoreError::NotFound(id))?;
        if incident.escalated_at.is_none() {
            incident.escalated_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Looks up one incident by id.
    pub async fn get(&self, id: Uuid) -> Option<SecurityIncident> {
        self.incidents.read().await.get(&id).cloned()
    }

    /// Returns all incidents not in a terminal status.
    pub async fn active(&self) -> Vec<SecurityIncident> {
        self.incidents
            .read()
            .await
            .values()
            .filter(|i| !i.status.is_terminal())
            .cloned()
            .collect()
    }

    /// Returns all incidents of the given type.
    pub async fn by_type(&self, incident_type: IncidentType) -> Vec<SecurityIncident> {
        self.incidents
            .read()
            .await
            .values()
            .filter(|i| i.incident_type == incident_type)
            .cloned()
            .collect()
    }

    /// Returns all incidents of the given severity.
    pub async fn by_severity(&self, severity: Severity) -> Vec<SecurityIncident> {
        self.incidents
            .read()
            .await
            .values()
            .filter(|i| i.severity == severity)
            .cloned()
            .collect()
    }

    /// Detection-to-resolution duration. Only defined for resolved incidents.
    pub async fn response_time(&self, id: Uuid) -> Option<Duration> {
        let incidents = self.incidents.read().await;
        let incident = incidents.get(&id)?;
        incident.resolved_at.map(|resolved| resolved - incident.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SecurityEvent;

    fn incident() -> SecurityIncident {
        SecurityIncident::from_rule_match(
            "rule-bf-01",
            IncidentType::BruteForce,
            Severity::High,
            "Possible brute force",
            SecurityEvent::new("auth-service", "auth_failure"),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = IncidentStore::new();
        let inc = incident();
        let id = inc.id;
        store.insert(inc).await;

        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.status, IncidentStatus::Detected);
        assert_eq!(fetched.source, "auth-service");
    }

    #[tokio::test]
    async fn test_resolution_stamps_resolved_at() {
        let store = IncidentStore::new();
        let inc = incident();
        let id = inc.id;
        store.insert(inc).await;

        let updated = store
            .update_status(id, IncidentStatus::Resolved, Some("analyst-1".into()))
            .await
            .unwrap();
        assert!(updated.resolved_at.is_some());
        assert_eq!(updated.assigned_to.as_deref(), Some("analyst-1"));
        assert!(store.response_time(id).await.is_some());
    }

    #[tokio::test]
    async fn test_terminal_status_rejects_transitions() {
        let store = IncidentStore::new();
        let inc = incident();
        let id = inc.id;
        store.insert(inc).await;

        store
            .update_status(id, IncidentStatus::FalsePositive, None)
            .await
            .unwrap();
        let err = store
            .update_status(id, IncidentStatus::Investigating, None)
            .await
            .unwrap_err();
        assert!(matches!(err, IncidentStoreError::TerminalStatus { .. }));
    }

    #[tokio::test]
    async fn test_unknown_incident_rejected() {
        let store = IncidentStore::new();
        let err = store
            .update_status(Uuid::new_v4(), IncidentStatus::Confirmed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, IncidentStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_queries() {
        let store = IncidentStore::new();
        let a = incident();
        let mut b = incident();
        b.id = Uuid::new_v4();
        b.incident_type = IncidentType::SqlInjection;
        b.severity = Severity::Critical;
        let b_id = b.id;
        store.insert(a).await;
        store.insert(b).await;

        store
            .update_status(b_id, IncidentStatus::Resolved, None)
            .await
            .unwrap();

        assert_eq!(store.active().await.len(), 1);
        assert_eq!(store.by_type(IncidentType::SqlInjection).await.len(), 1);
        assert_eq!(store.by_severity(Severity::Critical).await.len(), 1);
        assert_eq!(store.response_time(b_id).await.is_some(), true);
    }
}
