//! Incident response execution records.
//!
//! A response tracks one orchestrated playbook run for one incident. Action
//! statuses are monotonic: `Pending → Executing → {Completed | Failed}` or
//! `Pending → Skipped`; transitions never revert.

use crate::evidence::EvidenceItem;
use crate::playbook::ActionType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// How a response is being driven.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Driven entirely by the orchestrator.
    Automated,
    /// No automated path exists; a human must act.
    Manual,
    /// Automated steps with manual follow-up.
    Hybrid,
}

/// Overall status of a response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Status of one executed (or skipped) action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseActionStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Skipped,
}

/// One remediation step as executed within a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseAction {
    /// Unique identifier for this execution instance.
    pub id: Uuid,
    /// The playbook step this instance executes.
    pub playbook_action_id: String,
    /// What was done.
    pub action_type: ActionType,
    /// Step description copied from the playbook.
    pub description: String,
    /// When execution started, if it did.
    pub executed_at: Option<DateTime<Utc>>,
    /// Current status; only advances, never reverts.
    pub status: ResponseActionStatus,
    /// Executor output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseAction {
    /// Creates a pending instance for a playbook step.
    pub fn pending(
        playbook_action_id: impl Into<String>,
        action_type: ActionType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            playbook_action_id: playbook_action_id.into(),
            action_type,
            description: description.into(),
            executed_at: None,
            status: ResponseActionStatus::Pending,
            output: None,
            error: None,
        }
    }

    /// Marks the action executing. Only valid from `Pending`.
    pub fn mark_executing(&mut self) {
        if self.status == ResponseActionStatus::Pending {
            self.status = ResponseActionStatus::Executing;
            self.executed_at = Some(Utc::now());
        }
    }

    /// Marks the action completed with the executor output.
    pub fn mark_completed(&mut self, output: serde_json::Value) {
        if self.status == ResponseActionStatus::Executing {
            self.status = ResponseActionStatus::Completed;
            self.output = Some(output);
        }
    }

    /// Marks the action failed with an error message.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        if self.status == ResponseActionStatus::Executing {
            self.status = ResponseActionStatus::Failed;
            self.error = Some(error.into());
        }
    }

    /// Marks the action skipped. Only valid from `Pending`.
    pub fn mark_skipped(&mut self, reason: impl Into<String>) {
        if self.status == ResponseActionStatus::Pending {
            self.status = ResponseActionStatus::Skipped;
            self.error = Some(reason.into());
        }
    }
}

/// Outcome summary of a response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseResult {
    /// True iff no action failed.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Number of actions that ran to completion.
    pub actions_executed: usize,
    /// Number of actions that failed after retries.
    pub actions_failed: usize,
    /// Evidence collected for the incident.
    pub evidence: Vec<EvidenceItem>,
    /// Follow-up guidance for analysts.
    pub recommendations: Vec<String>,
}

/// One orchestrated response to one incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentResponse {
    /// Unique identifier.
    pub id: Uuid,
    /// The incident this response addresses.
    pub incident_id: Uuid,
    /// How the response is driven.
    pub response_type: ResponseType,
    /// Overall status.
    pub status: ResponseStatus,
    /// When orchestration started.
    pub started_at: DateTime<Utc>,
    /// When orchestration finished; always set once the orchestrator
    /// returns.
    pub completed_at: Option<DateTime<Utc>>,
    /// Who or what drove the response.
    pub executed_by: String,
    /// The per-step execution records, in execution order.
    pub actions: Vec<ResponseAction>,
    /// Outcome summary.
    pub result: ResponseResult,
}

impl IncidentResponse {
    /// Creates an in-progress automated response.
    pub fn started(incident_id: Uuid, executed_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            response_type: ResponseType::Automated,
            status: ResponseStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            executed_by: executed_by.into(),
            actions: Vec::new(),
            result: ResponseResult::default(),
        }
    }

    /// Creates a pending manual response for incidents with no automated
    /// playbook.
    pub fn manual(incident_id: Uuid, recommendations: Vec<String>, message: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            response_type: ResponseType::Manual,
            status: ResponseStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            executed_by: "manual".to_string(),
            actions: Vec::new(),
            result: ResponseResult {
                success: false,
                message: message.to_string(),
                actions_executed: 0,
                actions_failed: 0,
                evidence: Vec::new(),
                recommendations,
            },
        }
    }
}

/// Concurrency-safe store of responses, queryable by response id and by
/// incident id.
#[derive(Clone, Default)]
pub struct ResponseStore {
    by_id: Arc<RwLock<HashMap<Uuid, IncidentResponse>>>,
}

impl ResponseStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a response record.
    pub async fn upsert(&self, response: IncidentResponse) {
        self.by_id.write().await.insert(response.id, response);
    }

    /// Looks up one response by its id.
    pub async fn get(&self, id: Uuid) -> Option<IncidentResponse> {
        self.by_id.read().await.get(&id).cloned()
    }

    /// Returns all responses for an incident, oldest first.
    pub async fn by_incident(&self, incident_id: Uuid) -> Vec<IncidentResponse> {
        let mut responses: Vec<IncidentResponse> = self
            .by_id
            .read()
            .await
            .values()
            .filter(|r| r.incident_id == incident_id)
            .cloned()
            .collect();
        responses.sort_by_key(|r| r.started_at);
        responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_status_is_monotonic() {
        let mut action =
            ResponseAction::pending("pb-1", ActionType::BlockIp, "block the source");
        assert_eq!(action.status, ResponseActionStatus::Pending);

        action.mark_executing();
        assert_eq!(action.status, ResponseActionStatus::Executing);
        assert!(action.executed_at.is_some());

        action.mark_completed(serde_json::json!({"blocked": true}));
        assert_eq!(action.status, ResponseActionStatus::Completed);

        // Terminal: further transitions are ignored.
        action.mark_failed("too late");
        assert_eq!(action.status, ResponseActionStatus::Completed);
        assert!(action.error.is_none());
    }

    #[test]
    fn test_skip_only_from_pending() {
        let mut action =
            ResponseAction::pending("pb-1", ActionType::DisableUser, "disable the user");
        action.mark_executing();
        action.mark_skipped("condition false");
        assert_eq!(action.status, ResponseActionStatus::Executing);

        let mut fresh =
            ResponseAction::pending("pb-2", ActionType::DisableUser, "disable the user");
        fresh.mark_skipped("condition false");
        assert_eq!(fresh.status, ResponseActionStatus::Skipped);
        assert!(fresh.executed_at.is_none());
    }

    #[tokio::test]
    async fn test_store_query_by_incident() {
        let store = ResponseStore::new();
        let incident_id = Uuid::new_v4();

        let mut first = IncidentResponse::started(incident_id, "orchestrator");
        first.started_at = Utc::now() - chrono::Duration::seconds(10);
        let second = IncidentResponse::started(incident_id, "orchestrator");
        let other = IncidentResponse::started(Uuid::new_v4(), "orchestrator");

        let first_id = first.id;
        store.upsert(first).await;
        store.upsert(second).await;
        store.upsert(other).await;

        let for_incident = store.by_incident(incident_id).await;
        assert_eq!(for_incident.len(), 2);
        assert_eq!(for_incident[0].id, first_id);
    }
}
