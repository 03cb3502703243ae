//! End-to-end pipeline tests: event ingestion through detection, alerting,
//! and automated response, with mock connectors behind the real executor.

use aegis_actions::{ActionExecutor, EvidenceCollector};
use aegis_core::alert::AlertDispatcher;
use aegis_core::engine::{DetectionConfig, DetectionEngine};
use aegis_core::event::SecurityEvent;
use aegis_core::incident::{IncidentType, Severity};
use aegis_core::orchestrator::{OrchestratorConfig, ResponseOrchestrator, RetryPolicy};
use aegis_core::pipeline::SecurityPipeline;
use aegis_core::playbook::PlaybookRegistry;
use aegis_core::response::ResponseStatus;
use aegis_core::rule::{RuleCheck, SecurityRule};
use aegis_connectors::{
    MockBehavior, MockEndpointConnector, MockEvidenceStore, MockFirewallConnector,
    MockIdentityConnector, MockMonitoringConnector, MockNotifier,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

struct Harness {
    firewall: Arc<MockFirewallConnector>,
    identity: Arc<MockIdentityConnector>,
    endpoint: Arc<MockEndpointConnector>,
    monitoring: Arc<MockMonitoringConnector>,
    notifier: Arc<MockNotifier>,
    pipeline: SecurityPipeline,
}

fn pipeline_with_rules(rules: Option<Vec<SecurityRule>>) -> Harness {
    init_tracing();
    let firewall = Arc::new(MockFirewallConnector::new());
    let identity = Arc::new(MockIdentityConnector::new());
    let endpoint = Arc::new(MockEndpointConnector::new());
    let monitoring = Arc::new(MockMonitoringConnector::new());
    let notifier = Arc::new(MockNotifier::new());
    let evidence_store = Arc::new(MockEvidenceStore::new());

    let engine = match rules {
        Some(rules) => DetectionEngine::new(DetectionConfig::default(), rules),
        None => DetectionEngine::with_default_rules(DetectionConfig::default()),
    };
    let executor = Arc::new(ActionExecutor::new(
        firewall.clone(),
        identity.clone(),
        endpoint.clone(),
        monitoring.clone(),
        notifier.clone(),
    ));
    let collector = Arc::new(EvidenceCollector::new(
        monitoring.clone(),
        identity.clone(),
        evidence_store,
    ));
    let orchestrator = ResponseOrchestrator::new(
        PlaybookRegistry::with_defaults(),
        executor,
        collector,
        OrchestratorConfig {
            retry: RetryPolicy {
                base: std::time::Duration::from_millis(1),
                max: std::time::Duration::from_millis(4),
            },
            ..Default::default()
        },
    );
    let pipeline = SecurityPipeline::new(
        engine,
        AlertDispatcher::new(notifier.clone()),
        orchestrator,
    );

    Harness {
        firewall,
        identity,
        endpoint,
        monitoring,
        notifier,
        pipeline,
    }
}

#[tokio::test]
async fn brute_force_event_stream_runs_detection_through_response() {
    let h = pipeline_with_rules(None);
    h.monitoring
        .seed_logs("auth", &["failed login from 203.0.113.7"])
        .await;

    // Four failures stay below the threshold.
    for i in 0..4 {
        let event = SecurityEvent::new("203.0.113.7", "auth_failure")
            .with_ip_address("203.0.113.7")
            .with_user_id("u-4")
            .with_timestamp(Utc::now() - Duration::seconds(100 - i * 20));
        assert!(h.pipeline.handle_event(event).await.is_empty());
    }
    assert!(h.pipeline.incidents().active().await.is_empty());
    assert!(h.firewall.blocked_ips().await.is_empty());

    // The fifth failure completes the window and raises exactly one incident.
    let event = SecurityEvent::new("203.0.113.7", "auth_failure")
        .with_ip_address("203.0.113.7")
        .with_user_id("u-4");
    let incidents = h.pipeline.handle_event(event).await;
    assert_eq!(incidents.len(), 1);
    let incident = &incidents[0];
    assert_eq!(incident.incident_type, IncidentType::BruteForce);
    assert_eq!(incident.severity, Severity::High);

    // Stored, alerted, and responded to.
    assert!(h.pipeline.incidents().get(incident.id).await.is_some());
    assert!(h.notifier.sent_on("email").await >= 1);
    assert!(h.notifier.sent_on("chat").await >= 1);

    let responses = h.pipeline.responses().by_incident(incident.id).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, ResponseStatus::Completed);
    assert!(responses[0].result.success);
    assert!(!responses[0].result.evidence.is_empty());
    assert_eq!(h.firewall.blocked_ips().await, vec!["203.0.113.7".to_string()]);
}

#[tokio::test]
async fn benign_traffic_produces_no_incidents_or_side_effects() {
    let h = pipeline_with_rules(None);

    let event = SecurityEvent::new("gw", "http_request")
        .with_endpoint("/api/health")
        .with_status_code(200);
    assert!(h.pipeline.handle_event(event).await.is_empty());

    assert!(h.pipeline.incidents().active().await.is_empty());
    assert_eq!(h.notifier.sent().await.len(), 0);
    assert!(h.firewall.blocked_ips().await.is_empty());
}

#[tokio::test]
async fn failed_isolation_escalates_the_stored_incident() {
    let rule = SecurityRule::new(
        "rule-exfil-test",
        "Bulk export marker",
        IncidentType::DataExfiltration,
        Severity::Critical,
        "bulk export marker observed",
        RuleCheck::Custom(Arc::new(|event, _| Ok(event.event_type == "bulk_export"))),
    );
    let h = pipeline_with_rules(Some(vec![rule]));
    h.endpoint
        .set_behavior(MockBehavior::AlwaysFail("edr unreachable".into()))
        .await;

    let event = SecurityEvent::new("db-7", "bulk_export").with_user_id("u-4");
    let incidents = h.pipeline.handle_event(event).await;
    assert_eq!(incidents.len(), 1);

    let stored = h.pipeline.incidents().get(incidents[0].id).await.unwrap();
    assert!(stored.escalated_at.is_some());

    let responses = h.pipeline.responses().by_incident(incidents[0].id).await;
    assert_eq!(responses[0].status, ResponseStatus::Failed);
    // Steps after the failed isolation never ran.
    assert!(!h.identity.is_disabled("u-4").await);
}

#[tokio::test]
async fn disabled_rule_stops_detection_at_runtime() {
    let h = pipeline_with_rules(None);
    assert!(
        h.pipeline
            .engine()
            .set_rule_enabled("rule-sql-injection", false)
            .await
    );

    let event = SecurityEvent::new("gw", "http_request")
        .with_payload("id=1 UNION SELECT password FROM users");
    assert!(h.pipeline.handle_event(event).await.is_empty());
    assert!(h.firewall.blocked_ips().await.is_empty());
}
