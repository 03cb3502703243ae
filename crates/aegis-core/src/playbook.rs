//! Response playbooks: pre-configured remediation sequences keyed by
//! incident type and severity.
//!
//! Action conditions are a closed (field, operator, value) structure
//! evaluated by a safe interpreter; there is deliberately no expression
//! language here.

use crate::incident::{IncidentStatus, IncidentType, SecurityIncident, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Default per-action timeout.
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 30_000;

/// Remediation step types a playbook can schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    BlockIp,
    DisableUser,
    RevokeTokens,
    QuarantineFile,
    IsolateSystem,
    CollectEvidence,
    NotifyStakeholders,
    PatchVulnerability,
    ResetCredentials,
    EnableMonitoring,
    BackupData,
    RestoreService,
}

impl ActionType {
    /// Whether a failure of this action halts all later-ordered steps.
    pub fn is_critical(&self) -> bool {
        matches!(self, ActionType::IsolateSystem)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::BlockIp => "block_ip",
            ActionType::DisableUser => "disable_user",
            ActionType::RevokeTokens => "revoke_tokens",
            ActionType::QuarantineFile => "quarantine_file",
            ActionType::IsolateSystem => "isolate_system",
            ActionType::CollectEvidence => "collect_evidence",
            ActionType::NotifyStakeholders => "notify_stakeholders",
            ActionType::PatchVulnerability => "patch_vulnerability",
            ActionType::ResetCredentials => "reset_credentials",
            ActionType::EnableMonitoring => "enable_monitoring",
            ActionType::BackupData => "backup_data",
            ActionType::RestoreService => "restore_service",
        };
        write!(f, "{s}")
    }
}

/// Incident field a condition inspects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Severity,
    IncidentType,
    Source,
    Status,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
    In,
    /// Ordered comparison; only meaningful for severity.
    AtLeast,
}

/// Typed comparison operand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionValue {
    Severity(Severity),
    Severities(Vec<Severity>),
    IncidentType(IncidentType),
    IncidentTypes(Vec<IncidentType>),
    Source(String),
    Sources(Vec<String>),
    Status(IncidentStatus),
}

/// A safe, non-Turing-complete predicate over incident fields.
///
/// A condition whose field and value kinds do not line up evaluates to
/// false rather than erroring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionCondition {
    pub field: ConditionField,
    pub op: ConditionOp,
    pub value: ConditionValue,
}

impl ActionCondition {
    /// Condition: incident severity is at least `severity`.
    pub fn severity_at_least(severity: Severity) -> Self {
        Self {
            field: ConditionField::Severity,
            op: ConditionOp::AtLeast,
            value: ConditionValue::Severity(severity),
        }
    }

    /// Condition: incident severity equals `severity`.
    pub fn severity_is(severity: Severity) -> Self {
        Self {
            field: ConditionField::Severity,
            op: ConditionOp::Eq,
            value: ConditionValue::Severity(severity),
        }
    }

    /// Condition: incident type is one of `types`.
    pub fn type_in(types: Vec<IncidentType>) -> Self {
        Self {
            field: ConditionField::IncidentType,
            op: ConditionOp::In,
            value: ConditionValue::IncidentTypes(types),
        }
    }

    /// Condition: incident source equals `source`.
    pub fn source_is(source: impl Into<String>) -> Self {
        Self {
            field: ConditionField::Source,
            op: ConditionOp::Eq,
            value: ConditionValue::Source(source.into()),
        }
    }

    /// Evaluates the condition against an incident.
    pub fn evaluate(&self, incident: &SecurityIncident) -> bool {
        match (self.field, self.op, &self.value) {
            (ConditionField::Severity, ConditionOp::Eq, ConditionValue::Severity(v)) => {
                incident.severity == *v
            }
            (ConditionField::Severity, ConditionOp::Ne, ConditionValue::Severity(v)) => {
                incident.severity != *v
            }
            (ConditionField::Severity, ConditionOp::AtLeast, ConditionValue::Severity(v)) => {
                incident.severity >= *v
            }
            (ConditionField::Severity, ConditionOp::In, ConditionValue::Severities(vs)) => {
                vs.contains(&incident.severity)
            }
            (ConditionField::IncidentType, ConditionOp::Eq, ConditionValue::IncidentType(v)) => {
                incident.incident_type == *v
            }
            (ConditionField::IncidentType, ConditionOp::Ne, ConditionValue::IncidentType(v)) => {
                incident.incident_type != *v
            }
            (ConditionField::IncidentType, ConditionOp::In, ConditionValue::IncidentTypes(vs)) => {
                vs.contains(&incident.incident_type)
            }
            (ConditionField::Source, ConditionOp::Eq, ConditionValue::Source(v)) => {
                incident.source == *v
            }
            (ConditionField::Source, ConditionOp::Ne, ConditionValue::Source(v)) => {
                incident.source != *v
            }
            (ConditionField::Source, ConditionOp::In, ConditionValue::Sources(vs)) => {
                vs.contains(&incident.source)
            }
            (ConditionField::Status, ConditionOp::Eq, ConditionValue::Status(v)) => {
                incident.status == *v
            }
            (ConditionField::Status, ConditionOp::Ne, ConditionValue::Status(v)) => {
                incident.status != *v
            }
            _ => false,
        }
    }
}

/// One configured remediation step within a playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookAction {
    /// Stable identifier for this step.
    pub id: String,
    /// What to do.
    pub action_type: ActionType,
    /// Human-readable description of the step.
    pub description: String,
    /// Whether the executor may run this step without a human.
    pub automated: bool,
    /// Optional gate evaluated against the incident before execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ActionCondition>,
    /// Step parameters passed to the executor.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, serde_json::Value>,
    /// Execution order, ascending; ties run in registration order.
    pub order: i32,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Additional attempts after the first failure.
    pub max_retries: u32,
}

impl PlaybookAction {
    /// Creates an automated step with default timeout and no retries.
    pub fn new(id: impl Into<String>, action_type: ActionType, order: i32) -> Self {
        Self {
            id: id.into(),
            action_type,
            description: action_type.to_string(),
            automated: true,
            condition: None,
            parameters: HashMap::new(),
            order,
            timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            max_retries: 0,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the automated flag.
    pub fn with_automated(mut self, automated: bool) -> Self {
        self.automated = automated;
        self
    }

    /// Sets the execution condition.
    pub fn with_condition(mut self, condition: ActionCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Adds a parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// A named remediation sequence applicable to a set of incident types and
/// severities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePlaybook {
    /// Unique identifier.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Incident types this playbook applies to.
    pub incident_types: Vec<IncidentType>,
    /// Severities this playbook applies to.
    pub severities: Vec<Severity>,
    /// The remediation steps.
    pub actions: Vec<PlaybookAction>,
    /// Disabled playbooks are never selected.
    pub enabled: bool,
}

impl ResponsePlaybook {
    /// Creates an enabled playbook with no actions.
    pub fn new(
        name: impl Into<String>,
        incident_types: Vec<IncidentType>,
        severities: Vec<Severity>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            incident_types,
            severities,
            actions: Vec::new(),
            enabled: true,
        }
    }

    /// Adds an action.
    pub fn with_action(mut self, action: PlaybookAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether this playbook applies to the incident's type and severity.
    pub fn applies_to(&self, incident: &SecurityIncident) -> bool {
        self.enabled
            && self.incident_types.contains(&incident.incident_type)
            && self.severities.contains(&incident.severity)
    }
}

/// Ordered playbook collection. Selection is deterministic: the first
/// enabled playbook, in registration order, whose type-set and severity-set
/// both contain the incident's values.
#[derive(Debug, Clone, Default)]
pub struct PlaybookRegistry {
    playbooks: Vec<ResponsePlaybook>,
}

impl PlaybookRegistry {
    /// Creates a registry from an explicit playbook list.
    pub fn new(playbooks: Vec<ResponsePlaybook>) -> Self {
        Self { playbooks }
    }

    /// Creates a registry with the stock playbooks.
    pub fn with_defaults() -> Self {
        Self::new(default_playbooks())
    }

    /// Selects the playbook for an incident, if any applies.
    pub fn find(&self, incident: &SecurityIncident) -> Option<&ResponsePlaybook> {
        self.playbooks.iter().find(|p| p.applies_to(incident))
    }

    /// All registered playbooks, in registration order.
    pub fn playbooks(&self) -> &[ResponsePlaybook] {
        &self.playbooks
    }
}

/// The stock playbook set.
pub fn default_playbooks() -> Vec<ResponsePlaybook> {
    vec![
        ResponsePlaybook::new(
            "Brute force containment",
            vec![IncidentType::BruteForce],
            vec![Severity::High, Severity::Critical],
        )
        .with_action(
            PlaybookAction::new("bf-block", ActionType::BlockIp, 1)
                .with_description("Block the attacking source address")
                .with_parameter("duration_secs", serde_json::json!(3600)),
        )
        .with_action(
            PlaybookAction::new("bf-evidence", ActionType::CollectEvidence, 2)
                .with_description("Capture recent authentication logs")
                .with_parameter("log_source", serde_json::json!("auth")),
        )
        .with_action(
            PlaybookAction::new("bf-notify", ActionType::NotifyStakeholders, 3)
                .with_description("Notify the on-call security analyst"),
        )
        .with_action(
            PlaybookAction::new("bf-monitor", ActionType::EnableMonitoring, 4)
                .with_description("Enable enhanced monitoring for the source")
                .with_condition(ActionCondition::severity_at_least(Severity::Critical))
                .with_parameter("mode", serde_json::json!("enhanced")),
        ),
        ResponsePlaybook::new(
            "SQL injection response",
            vec![IncidentType::SqlInjection],
            vec![Severity::High, Severity::Critical],
        )
        .with_action(
            PlaybookAction::new("sqli-block", ActionType::BlockIp, 1)
                .with_description("Block the injecting source address")
                .with_parameter("duration_secs", serde_json::json!(86400)),
        )
        .with_action(
            PlaybookAction::new("sqli-request-log", ActionType::CollectEvidence, 2)
                .with_description("Capture the offending request excerpt")
                .with_parameter("log_source", serde_json::json!("requests")),
        )
        .with_action(
            PlaybookAction::new("sqli-db-audit", ActionType::CollectEvidence, 2)
                .with_description("Capture database query audit records")
                .with_parameter("log_source", serde_json::json!("database")),
        )
        .with_action(
            PlaybookAction::new("sqli-notify", ActionType::NotifyStakeholders, 3)
                .with_description("Notify the application security team"),
        ),
        ResponsePlaybook::new(
            "Data exfiltration containment",
            vec![IncidentType::DataExfiltration],
            vec![Severity::High, Severity::Critical],
        )
        .with_action(
            PlaybookAction::new("exfil-isolate", ActionType::IsolateSystem, 1)
                .with_description("Isolate the affected system from the network"),
        )
        .with_action(
            PlaybookAction::new("exfil-revoke", ActionType::RevokeTokens, 2)
                .with_description("Revoke all tokens for the acting user"),
        )
        .with_action(
            PlaybookAction::new("exfil-disable", ActionType::DisableUser, 3)
                .with_description("Disable the acting user account"),
        )
        .with_action(
            PlaybookAction::new("exfil-evidence", ActionType::CollectEvidence, 4)
                .with_description("Capture data access audit records")
                .with_parameter("log_source", serde_json::json!("data_access")),
        )
        .with_action(
            PlaybookAction::new("exfil-notify", ActionType::NotifyStakeholders, 5)
                .with_description("Notify the incident response team")
                .with_parameter("priority", serde_json::json!("urgent")),
        ),
        ResponsePlaybook::new(
            "Privilege escalation response",
            vec![IncidentType::PrivilegeEscalation],
            vec![Severity::Medium, Severity::High, Severity::Critical],
        )
        .with_action(
            PlaybookAction::new("privesc-disable", ActionType::DisableUser, 1)
                .with_description("Disable the escalating account"),
        )
        .with_action(
            PlaybookAction::new("privesc-revoke", ActionType::RevokeTokens, 2)
                .with_description("Revoke all tokens for the escalating account"),
        )
        .with_action(
            PlaybookAction::new("privesc-evidence", ActionType::CollectEvidence, 3)
                .with_description("Capture a permission audit")
                .with_parameter("log_source", serde_json::json!("permissions")),
        )
        .with_action(
            PlaybookAction::new("privesc-notify", ActionType::NotifyStakeholders, 4)
                .with_description("Notify the identity team"),
        ),
        ResponsePlaybook::new(
            "Cross-site scripting triage",
            vec![IncidentType::CrossSiteScripting],
            vec![Severity::High],
        )
        .with_action(
            PlaybookAction::new("xss-evidence", ActionType::CollectEvidence, 1)
                .with_description("Capture the offending request excerpt")
                .with_parameter("log_source", serde_json::json!("requests")),
        )
        .with_action(
            PlaybookAction::new("xss-notify", ActionType::NotifyStakeholders, 2)
                .with_description("Notify the application security team"),
        ),
    ]
}
