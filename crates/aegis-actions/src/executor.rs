//! The action executor: one remediation step in, one connector call out.
//!
//! Each handler extracts the fields it needs from the incident's triggering
//! event and the step parameters, and fails fast with a descriptive error
//! when a required field is missing. Timeout and retry policy belong to the
//! orchestrator; a call here is a single attempt.

use aegis_core::alert::{AlertMessage, AlertPriority, Notifier};
use aegis_core::incident::SecurityIncident;
use aegis_core::orchestrator::{ActionRunError, ActionRunner};
use aegis_core::playbook::{ActionType, PlaybookAction};
use aegis_connectors::{
    ConnectorError, EndpointConnector, FirewallConnector, IdentityConnector, LogQuery,
    MonitoringConnector,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

/// Default block duration when a BlockIp step carries no parameter.
const DEFAULT_BLOCK_SECS: u64 = 3600;
/// Default enhanced-monitoring duration.
const DEFAULT_MONITOR_SECS: u64 = 86_400;

/// Dispatches playbook action types to the matching capability port.
pub struct ActionExecutor {
    firewall: Arc<dyn FirewallConnector>,
    identity: Arc<dyn IdentityConnector>,
    endpoint: Arc<dyn EndpointConnector>,
    monitoring: Arc<dyn MonitoringConnector>,
    notifier: Arc<dyn Notifier>,
}

impl ActionExecutor {
    /// Creates an executor over the given ports.
    pub fn new(
        firewall: Arc<dyn FirewallConnector>,
        identity: Arc<dyn IdentityConnector>,
        endpoint: Arc<dyn EndpointConnector>,
        monitoring: Arc<dyn MonitoringConnector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            firewall,
            identity,
            endpoint,
            monitoring,
            notifier,
        }
    }

    /// The source address to act on: the triggering event's client IP when
    /// present, else its source.
    fn target_ip(incident: &SecurityIncident) -> &str {
        incident
            .triggering_event
            .ip_address
            .as_deref()
            .unwrap_or(&incident.source)
    }

    /// The acting user, required by account-level actions.
    fn require_user<'a>(
        action: &PlaybookAction,
        incident: &'a SecurityIncident,
    ) -> Result<&'a str, ActionRunError> {
        incident
            .triggering_event
            .user_id
            .as_deref()
            .ok_or_else(|| ActionRunError::MissingField {
                action: action.id.clone(),
                field: "user_id".to_string(),
            })
    }

    fn param_str<'a>(action: &'a PlaybookAction, key: &str) -> Option<&'a str> {
        action.parameters.get(key).and_then(|v| v.as_str())
    }

    fn param_u64(action: &PlaybookAction, key: &str) -> Option<u64> {
        action.parameters.get(key).and_then(|v| v.as_u64())
    }

    fn require_param<'a>(
        action: &'a PlaybookAction,
        key: &str,
    ) -> Result<&'a str, ActionRunError> {
        Self::param_str(action, key).ok_or_else(|| ActionRunError::MissingField {
            action: action.id.clone(),
            field: key.to_string(),
        })
    }
}

fn connector_err(err: ConnectorError) -> ActionRunError {
    ActionRunError::Connector(err.to_string())
}

#[async_trait]
impl ActionRunner for ActionExecutor {
    #[instrument(skip(self, action, incident), fields(action_id = %action.id, action_type = %action.action_type, incident_id = %incident.id))]
    async fn run(
        &self,
        action: &PlaybookAction,
        incident: &SecurityIncident,
    ) -> Result<serde_json::Value, ActionRunError> {
        if !action.automated {
            return Err(ActionRunError::Unsupported(format!(
                "{} is a manual-only step",
                action.id
            )));
        }

        match action.action_type {
            ActionType::BlockIp => {
                let ip = Self::target_ip(incident);
                let duration_secs =
                    Self::param_u64(action, "duration_secs").unwrap_or(DEFAULT_BLOCK_SECS);
                let outcome = self
                    .firewall
                    .block_ip(ip, duration_secs, &incident.description)
                    .await
                    .map_err(connector_err)?;
                info!(ip, duration_secs, "source blocked");
                Ok(serde_json::json!({
                    "ip": outcome.ip,
                    "blocked_until": outcome.blocked_until,
                    "rule_ref": outcome.rule_ref,
                }))
            }
            ActionType::DisableUser => {
                let user = Self::require_user(action, incident)?;
                self.identity
                    .disable_user(user, &incident.description)
                    .await
                    .map_err(connector_err)?;
                info!(user, "account disabled");
                Ok(serde_json::json!({ "user_id": user, "disabled": true }))
            }
            ActionType::RevokeTokens => {
                let user = Self::require_user(action, incident)?;
                let revoked = self
                    .identity
                    .revoke_tokens(user)
                    .await
                    .map_err(connector_err)?;
                info!(user, revoked, "tokens revoked");
                Ok(serde_json::json!({ "user_id": user, "revoked": revoked }))
            }
            ActionType::ResetCredentials => {
                let user = Self::require_user(action, incident)?;
                self.identity
                    .reset_credentials(user)
                    .await
                    .map_err(connector_err)?;
                Ok(serde_json::json!({ "user_id": user, "reset": true }))
            }
            ActionType::QuarantineFile => {
                let path = Self::require_param(action, "file_path")?;
                self.endpoint
                    .quarantine_file(&incident.source, path)
                    .await
                    .map_err(connector_err)?;
                Ok(serde_json::json!({ "target": incident.source, "file_path": path }))
            }
            ActionType::IsolateSystem => {
                self.endpoint
                    .isolate_system(&incident.source, &incident.description)
                    .await
                    .map_err(connector_err)?;
                info!(target = %incident.source, "system isolated");
                Ok(serde_json::json!({ "target": incident.source, "isolated": true }))
            }
            ActionType::PatchVulnerability => {
                let patch_id = Self::require_param(action, "patch_id")?;
                self.endpoint
                    .patch_vulnerability(&incident.source, patch_id)
                    .await
                    .map_err(connector_err)?;
                Ok(serde_json::json!({ "target": incident.source, "patch_id": patch_id }))
            }
            ActionType::BackupData => {
                let scope = Self::param_str(action, "scope").unwrap_or("full");
                self.endpoint
                    .backup_data(&incident.source, scope)
                    .await
                    .map_err(connector_err)?;
                Ok(serde_json::json!({ "target": incident.source, "scope": scope }))
            }
            ActionType::RestoreService => {
                let service = Self::require_param(action, "service")?;
                self.endpoint
                    .restore_service(&incident.source, service)
                    .await
                    .map_err(connector_err)?;
                Ok(serde_json::json!({ "target": incident.source, "service": service }))
            }
            ActionType::CollectEvidence => {
                let source = Self::param_str(action, "log_source").unwrap_or("application");
                let query = LogQuery::source(source).with_filter(incident.source.clone());
                let records = self
                    .monitoring
                    .query_logs(&query)
                    .await
                    .map_err(connector_err)?;
                info!(log_source = source, records = records.len(), "evidence query executed");
                Ok(serde_json::json!({ "log_source": source, "records": records.len() }))
            }
            ActionType::NotifyStakeholders => {
                let mut message = AlertMessage::for_incident(incident);
                // A "priority" parameter overrides the severity-derived one.
                if let Some(priority) = Self::param_str(action, "priority") {
                    message.priority = match priority {
                        "low" => AlertPriority::Low,
                        "normal" => AlertPriority::Normal,
                        "urgent" => AlertPriority::Urgent,
                        other => {
                            return Err(ActionRunError::Unsupported(format!(
                                "unknown notification priority: {other}"
                            )))
                        }
                    };
                }
                let channels: Vec<String> = match action.parameters.get("channels") {
                    Some(value) => value
                        .as_array()
                        .map(|entries| {
                            entries
                                .iter()
                                .filter_map(|c| c.as_str().map(str::to_string))
                                .collect()
                        })
                        .ok_or_else(|| ActionRunError::MissingField {
                            action: action.id.clone(),
                            field: "channels".to_string(),
                        })?,
                    None => vec!["email".to_string(), "chat".to_string()],
                };
                let mut delivered = 0u64;
                for channel in &channels {
                    let result = match channel.as_str() {
                        "email" => self.notifier.send_email(&message).await,
                        "chat" => self.notifier.send_chat(&message).await,
                        "sms" => self.notifier.send_sms(&message).await,
                        "page" => self.notifier.send_page(&message).await,
                        other => {
                            return Err(ActionRunError::Unsupported(format!(
                                "unknown notification channel: {other}"
                            )))
                        }
                    };
                    if result.is_ok() {
                        delivered += 1;
                    }
                }
                if delivered == 0 {
                    return Err(ActionRunError::Connector(
                        "no stakeholder channel accepted the notification".to_string(),
                    ));
                }
                Ok(serde_json::json!({ "delivered": delivered, "channels": channels }))
            }
            ActionType::EnableMonitoring => {
                let mode = Self::param_str(action, "mode").unwrap_or("enhanced");
                let duration_secs =
                    Self::param_u64(action, "duration_secs").unwrap_or(DEFAULT_MONITOR_SECS);
                self.monitoring
                    .enable_enhanced_monitoring(&incident.source, mode, duration_secs)
                    .await
                    .map_err(connector_err)?;
                Ok(serde_json::json!({ "target": incident.source, "mode": mode }))
            }
        }
    }
}
