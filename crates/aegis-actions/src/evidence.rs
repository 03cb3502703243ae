//! Evidence collection appropriate to each incident type.
//!
//! Collection is best-effort: a failed query or store call is logged and
//! drops that item from the set; it never fails the response.

use aegis_core::evidence::{EvidenceItem, EvidenceType};
use aegis_core::incident::{IncidentType, SecurityIncident};
use aegis_core::orchestrator::EvidenceGatherer;
use aegis_connectors::{EvidenceStore, IdentityConnector, LogQuery, MonitoringConnector};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Gathers and persists type-specific supporting evidence.
pub struct EvidenceCollector {
    monitoring: Arc<dyn MonitoringConnector>,
    identity: Arc<dyn IdentityConnector>,
    store: Arc<dyn EvidenceStore>,
}

impl EvidenceCollector {
    /// Creates a collector over the given ports.
    pub fn new(
        monitoring: Arc<dyn MonitoringConnector>,
        identity: Arc<dyn IdentityConnector>,
        store: Arc<dyn EvidenceStore>,
    ) -> Self {
        Self {
            monitoring,
            identity,
            store,
        }
    }

    /// Runs one log query and wraps the result as an evidence item.
    /// Returns None on failure or when nothing matched.
    async fn log_excerpt(
        &self,
        incident: &SecurityIncident,
        log_source: &str,
        evidence_type: EvidenceType,
        description: &str,
    ) -> Option<EvidenceItem> {
        let query = LogQuery::source(log_source).with_filter(incident.source.clone());
        match self.monitoring.query_logs(&query).await {
            Ok(records) if records.is_empty() => {
                debug!(log_source, "no matching log records");
                None
            }
            Ok(records) => match serde_json::to_value(&records) {
                Ok(data) => Some(EvidenceItem::new(evidence_type, description, data)),
                Err(err) => {
                    warn!(log_source, error = %err, "could not serialize log records");
                    None
                }
            },
            Err(err) => {
                warn!(log_source, error = %err, "evidence log query failed");
                None
            }
        }
    }

    /// The triggering event itself, always capturable.
    fn triggering_event_item(&self, incident: &SecurityIncident) -> Option<EvidenceItem> {
        match serde_json::to_value(&incident.triggering_event) {
            Ok(data) => Some(EvidenceItem::new(
                EvidenceType::LogEntry,
                format!("Triggering event for incident {}", incident.id),
                data,
            )),
            Err(err) => {
                warn!(error = %err, "could not serialize triggering event");
                None
            }
        }
    }

    async fn type_specific(&self, incident: &SecurityIncident) -> Vec<EvidenceItem> {
        let mut items = Vec::new();
        match incident.incident_type {
            IncidentType::BruteForce | IncidentType::RateLimitAbuse => {
                if let Some(item) = self
                    .log_excerpt(
                        incident,
                        "auth",
                        EvidenceType::LogEntry,
                        "Authentication log excerpt around the incident window",
                    )
                    .await
                {
                    items.push(item);
                }
            }
            IncidentType::SqlInjection | IncidentType::CrossSiteScripting => {
                if let Some(item) = self
                    .log_excerpt(
                        incident,
                        "requests",
                        EvidenceType::NetworkTraffic,
                        "Request log excerpt containing the injection attempt",
                    )
                    .await
                {
                    items.push(item);
                }
            }
            IncidentType::PrivilegeEscalation => {
                if let Some(user) = incident.triggering_event.user_id.as_deref() {
                    match self.identity.audit_permissions(user).await {
                        Ok(grants) => {
                            if let Ok(data) = serde_json::to_value(&grants) {
                                items.push(EvidenceItem::new(
                                    EvidenceType::Configuration,
                                    format!("Permission audit for {user}"),
                                    data,
                                ));
                            }
                        }
                        Err(err) => {
                            warn!(user, error = %err, "permission audit failed");
                        }
                    }
                }
            }
            IncidentType::DataExfiltration => {
                if let Some(item) = self
                    .log_excerpt(
                        incident,
                        "data_access",
                        EvidenceType::DatabaseRecord,
                        "Data access audit records for the incident window",
                    )
                    .await
                {
                    items.push(item);
                }
            }
            IncidentType::SuspiciousActivity => {
                if let Some(item) = self
                    .log_excerpt(
                        incident,
                        "application",
                        EvidenceType::LogEntry,
                        "Application log excerpt around the incident window",
                    )
                    .await
                {
                    items.push(item);
                }
            }
        }
        items
    }
}

#[async_trait]
impl EvidenceGatherer for EvidenceCollector {
    #[instrument(skip(self, incident), fields(incident_id = %incident.id, incident_type = %incident.incident_type))]
    async fn collect(&self, incident: &SecurityIncident) -> Vec<EvidenceItem> {
        let mut candidates = Vec::new();
        if let Some(item) = self.triggering_event_item(incident) {
            candidates.push(item);
        }
        candidates.extend(self.type_specific(incident).await);

        // Persist each item; a store failure drops the item but keeps the
        // rest of the set.
        let mut collected = Vec::with_capacity(candidates.len());
        for item in candidates {
            match self.store.store(&item).await {
                Ok(()) => collected.push(item),
                Err(err) => {
                    warn!(evidence_id = %item.id, error = %err, "evidence store failed, dropping item");
                }
            }
        }
        debug!(count = collected.len(), "evidence collected");
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::event::SecurityEvent;
    use aegis_core::incident::Severity;
    use aegis_connectors::{
        MockBehavior, MockEvidenceStore, MockIdentityConnector, MockMonitoringConnector,
        PermissionGrant,
    };
    use chrono::Utc;

    struct Harness {
        monitoring: Arc<MockMonitoringConnector>,
        identity: Arc<MockIdentityConnector>,
        store: Arc<MockEvidenceStore>,
        collector: EvidenceCollector,
    }

    fn harness() -> Harness {
        let monitoring = Arc::new(MockMonitoringConnector::new());
        let identity = Arc::new(MockIdentityConnector::new());
        let store = Arc::new(MockEvidenceStore::new());
        let collector =
            EvidenceCollector::new(monitoring.clone(), identity.clone(), store.clone());
        Harness {
            monitoring,
            identity,
            store,
            collector,
        }
    }

    fn incident(incident_type: IncidentType) -> SecurityIncident {
        SecurityIncident::from_rule_match(
            "rule-x",
            incident_type,
            Severity::High,
            "test",
            SecurityEvent::new("web-1", "auth_failure").with_user_id("u-9"),
        )
    }

    #[tokio::test]
    async fn test_brute_force_collects_auth_logs() {
        let h = harness();
        h.monitoring
            .seed_logs("auth", &["failed login on web-1", "failed login on web-1"])
            .await;

        let items = h.collector.collect(&incident(IncidentType::BruteForce)).await;
        // Triggering event + auth excerpt.
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|i| i.evidence_type == EvidenceType::LogEntry
            && i.description.contains("Authentication log")));
        assert_eq!(h.store.items().await.len(), 2);
        assert!(items.iter().all(|i| i.verify_integrity()));
    }

    #[tokio::test]
    async fn test_privilege_escalation_audits_permissions() {
        let h = harness();
        h.identity
            .seed_grants(
                "u-9",
                vec![PermissionGrant {
                    user_id: "u-9".into(),
                    permission: "admin".into(),
                    granted_by: "u-2".into(),
                    granted_at: Utc::now(),
                }],
            )
            .await;

        let items = h
            .collector
            .collect(&incident(IncidentType::PrivilegeEscalation))
            .await;
        assert!(items
            .iter()
            .any(|i| i.evidence_type == EvidenceType::Configuration));
    }

    #[tokio::test]
    async fn test_query_failure_yields_partial_set() {
        let h = harness();
        h.monitoring
            .set_behavior(MockBehavior::AlwaysFail("siem down".into()))
            .await;

        let items = h.collector.collect(&incident(IncidentType::BruteForce)).await;
        // The triggering event item survives the failed log query.
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_drops_item_but_never_errors() {
        let h = harness();
        h.store
            .set_behavior(MockBehavior::AlwaysFail("bucket down".into()))
            .await;

        let items = h.collector.collect(&incident(IncidentType::BruteForce)).await;
        assert!(items.is_empty());
        assert!(h.store.items().await.is_empty());
    }
}
