//! Response orchestration: playbook selection and sequential step execution.
//!
//! The orchestrator owns the partial-failure semantics of a response run:
//! per-step timeouts and retries, conditional skipping, critical-abort on
//! `IsolateSystem` failure, evidence collection, and recommendations. A
//! response returned by [`ResponseOrchestrator::respond`] is never left
//! `Pending` or `InProgress`.

use crate::evidence::EvidenceItem;
use crate::incident::SecurityIncident;
use crate::playbook::{PlaybookAction, PlaybookRegistry};
use crate::recommend::RecommendationGenerator;
use crate::response::{IncidentResponse, ResponseAction, ResponseStatus};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Errors an action runner can report for a single attempt.
#[derive(Error, Debug)]
pub enum ActionRunError {
    #[error("Action {action}: required field missing: {field}")]
    MissingField { action: String, field: String },

    #[error("Unsupported action: {0}")]
    Unsupported(String),

    #[error("Connector error: {0}")]
    Connector(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Executes one remediation step against the outside world. One call is one
/// attempt; timeout and retry policy live in the orchestrator.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(
        &self,
        action: &PlaybookAction,
        incident: &SecurityIncident,
    ) -> Result<serde_json::Value, ActionRunError>;
}

/// Gathers supporting evidence for an incident. Infallible by contract:
/// internal failures reduce the returned set instead of erroring.
#[async_trait]
pub trait EvidenceGatherer: Send + Sync {
    async fn collect(&self, incident: &SecurityIncident) -> Vec<EvidenceItem>;
}

/// Bounded exponential backoff between retry attempts: the delay before
/// attempt `n + 1` is `base × 2^n`, capped at `max`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Backoff policy applied between retry attempts of one step.
    pub retry: RetryPolicy,
    /// Recorded as `executed_by` on automated responses.
    pub executed_by: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            executed_by: "aegis-orchestrator".to_string(),
        }
    }
}

/// Cooperative cancellation handle for a response run.
///
/// Cancellation stops scheduling further actions; the in-flight attempt
/// finishes or times out normally, then the response is marked `Cancelled`.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    /// Creates a fresh, uncancelled handle.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Selects a playbook for an incident and executes it step by step.
///
/// Distinct incidents may be orchestrated concurrently; one response's steps
/// are strictly sequential.
#[derive(Clone)]
pub struct ResponseOrchestrator {
    registry: Arc<PlaybookRegistry>,
    runner: Arc<dyn ActionRunner>,
    evidence: Arc<dyn EvidenceGatherer>,
    recommender: RecommendationGenerator,
    config: OrchestratorConfig,
}

impl ResponseOrchestrator {
    /// Creates an orchestrator over the given registry and ports.
    pub fn new(
        registry: PlaybookRegistry,
        runner: Arc<dyn ActionRunner>,
        evidence: Arc<dyn EvidenceGatherer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            runner,
            evidence,
            recommender: RecommendationGenerator::new(),
            config,
        }
    }

    /// Orchestrates the response for one incident.
    pub async fn respond(&self, incident: &SecurityIncident) -> IncidentResponse {
        self.respond_with_cancel(incident, &CancelHandle::new()).await
    }

    /// Orchestrates the response for one incident with cooperative
    /// cancellation.
    ///
    /// The returned response always has status `Completed`, `Failed`,
    /// `Cancelled`, or — for the no-playbook manual fallback — `Pending`
    /// with recommendations attached; it is never `InProgress`.
    #[instrument(skip(self, incident, cancel), fields(incident_id = %incident.id, incident_type = %incident.incident_type))]
    pub async fn respond_with_cancel(
        &self,
        incident: &SecurityIncident,
        cancel: &CancelHandle,
    ) -> IncidentResponse {
        let Some(playbook) = self.registry.find(incident) else {
            info!("no playbook matches; producing manual response");
            return IncidentResponse::manual(
                incident.id,
                self.recommender.for_unmatched(incident),
                &format!(
                    "No enabled playbook covers {} incidents at {} severity.",
                    incident.incident_type, incident.severity
                ),
            );
        };
        let playbook = playbook.clone();
        info!(playbook = %playbook.name, actions = playbook.actions.len(), "executing playbook");

        let mut response = IncidentResponse::started(incident.id, &self.config.executed_by);

        // Failures inside step execution are recorded on the step, so
        // playbook execution itself is infallible and the response always
        // reaches a terminal status.
        let aborted = self
            .execute_playbook(incident, &playbook, &mut response, cancel)
            .await;

        let cancelled = cancel.is_cancelled();
        let failed = response.result.actions_failed;
        response.result.evidence = self.evidence.collect(incident).await;
        response.result.recommendations = self.recommender.for_response(incident, failed, aborted);
        response.result.success = failed == 0 && !cancelled;
        response.status = if cancelled {
            ResponseStatus::Cancelled
        } else if failed == 0 {
            ResponseStatus::Completed
        } else {
            ResponseStatus::Failed
        };
        response.result.message = self.summary(&response, &playbook.name, aborted, cancelled);
        response.completed_at = Some(chrono::Utc::now());
        response
    }

    /// Runs the playbook's steps in order, recording each outcome on the
    /// response. Returns whether a critical failure aborted later steps.
    async fn execute_playbook(
        &self,
        incident: &SecurityIncident,
        playbook: &crate::playbook::ResponsePlaybook,
        response: &mut IncidentResponse,
        cancel: &CancelHandle,
    ) -> bool {
        // Stable sort: equal orders keep registration order.
        let mut ordered: Vec<&PlaybookAction> = playbook.actions.iter().collect();
        ordered.sort_by_key(|a| a.order);

        // After a critical failure at order k, steps with order > k must not
        // run; steps tied at order k still do.
        let mut abort_after_order: Option<i32> = None;
        let mut aborted = false;

        for action in ordered {
            let mut record =
                ResponseAction::pending(&action.id, action.action_type, &action.description);

            if let Some(order) = abort_after_order {
                if action.order > order {
                    aborted = true;
                    response.actions.push(record);
                    continue;
                }
            }
            if cancel.is_cancelled() {
                response.actions.push(record);
                continue;
            }

            if let Some(condition) = &action.condition {
                if !condition.evaluate(incident) {
                    debug!(action = %action.id, "condition false, skipping");
                    record.mark_skipped("condition evaluated false");
                    response.actions.push(record);
                    continue;
                }
            }
            if !action.automated {
                debug!(action = %action.id, "manual-only step, not executed automatically");
                record.mark_skipped("manual step, not executed automatically");
                response.actions.push(record);
                continue;
            }

            record.mark_executing();
            match self.run_with_retry(action, incident).await {
                Ok(output) => {
                    record.mark_completed(output);
                    response.result.actions_executed += 1;
                }
                Err(message) => {
                    warn!(action = %action.id, error = %message, "action failed");
                    record.mark_failed(&message);
                    response.result.actions_failed += 1;
                    if action.action_type.is_critical() {
                        warn!(action = %action.id, "critical action failed, aborting remaining steps");
                        abort_after_order = Some(action.order);
                    }
                }
            }
            response.actions.push(record);
        }

        aborted || abort_after_order.is_some()
    }

    /// Runs one step with its per-attempt timeout and retry budget. A timed
    /// out attempt counts as a failed attempt. Returns the final error
    /// message after the budget is exhausted.
    async fn run_with_retry(
        &self,
        action: &PlaybookAction,
        incident: &SecurityIncident,
    ) -> Result<serde_json::Value, String> {
        let timeout = Duration::from_millis(action.timeout_ms);
        let mut last_error = String::new();

        for attempt in 0..=action.max_retries {
            match tokio::time::timeout(timeout, self.runner.run(action, incident)).await {
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(err)) => {
                    last_error = err.to_string();
                }
                Err(_) => {
                    last_error = format!("timed out after {}ms", action.timeout_ms);
                }
            }
            if attempt < action.max_retries {
                let delay = self.config.retry.delay_for(attempt);
                debug!(
                    action = %action.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
        Err(last_error)
    }

    fn summary(
        &self,
        response: &IncidentResponse,
        playbook_name: &str,
        aborted: bool,
        cancelled: bool,
    ) -> String {
        let skipped = response
            .actions
            .iter()
            .filter(|a| a.status == crate::response::ResponseActionStatus::Skipped)
            .count();
        let executed = response.result.actions_executed;
        let failed = response.result.actions_failed;
        if cancelled {
            format!(
                "Playbook '{playbook_name}' cancelled after {executed} completed and {failed} failed action(s)."
            )
        } else if aborted {
            format!(
                "Playbook '{playbook_name}' aborted by a critical action failure: {executed} completed, {failed} failed, {skipped} skipped."
            )
        } else if failed == 0 {
            format!(
                "Playbook '{playbook_name}' completed: {executed} action(s) executed, {skipped} skipped."
            )
        } else {
            format!(
                "Playbook '{playbook_name}' finished with failures: {executed} completed, {failed} failed, {skipped} skipped."
            )
        }
    }
}
