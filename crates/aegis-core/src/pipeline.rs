//! End-to-end wiring: detection, storage, alerting, and response.
//!
//! The pipeline is the ingestion entry point upstream producers call. Each
//! event runs detection; every raised incident is stored, alerted on, and
//! responded to. Incidents raised by one event are orchestrated
//! concurrently; the per-incident step sequence stays strictly sequential
//! inside the orchestrator.

use crate::alert::AlertDispatcher;
use crate::engine::DetectionEngine;
use crate::event::SecurityEvent;
use crate::incident::{IncidentStore, SecurityIncident};
use crate::orchestrator::ResponseOrchestrator;
use crate::response::{ResponseActionStatus, ResponseStore};
use tracing::{info, instrument, warn};

/// Wires the detection and response stages together.
#[derive(Clone)]
pub struct SecurityPipeline {
    engine: DetectionEngine,
    incidents: IncidentStore,
    dispatcher: AlertDispatcher,
    orchestrator: ResponseOrchestrator,
    responses: ResponseStore,
}

impl SecurityPipeline {
    /// Assembles a pipeline from its stages.
    pub fn new(
        engine: DetectionEngine,
        dispatcher: AlertDispatcher,
        orchestrator: ResponseOrchestrator,
    ) -> Self {
        Self {
            engine,
            incidents: IncidentStore::new(),
            dispatcher,
            orchestrator,
            responses: ResponseStore::new(),
        }
    }

    /// Ingests one event end to end and returns the incidents it raised.
    ///
    /// Never errors: detection, alerting, and response all contain their own
    /// failures.
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn handle_event(&self, event: SecurityEvent) -> Vec<SecurityIncident> {
        let incidents = self.engine.process_event(event).await;
        if incidents.is_empty() {
            return incidents;
        }
        info!(count = incidents.len(), "incidents detected");

        for incident in &incidents {
            self.incidents.insert(incident.clone()).await;
            self.dispatcher.dispatch(incident).await;
        }

        let runs = incidents.iter().map(|incident| {
            let orchestrator = self.orchestrator.clone();
            let responses = self.responses.clone();
            let incidents = self.incidents.clone();
            let incident = incident.clone();
            async move {
                let response = orchestrator.respond(&incident).await;
                let critical_abort = response
                    .actions
                    .iter()
                    .any(|a| a.action_type.is_critical() && a.status == ResponseActionStatus::Failed);
                if critical_abort {
                    if let Err(err) = incidents.mark_escalated(incident.id).await {
                        warn!(incident_id = %incident.id, error = %err, "failed to mark escalation");
                    }
                }
                responses.upsert(response).await;
            }
        });
        futures::future::join_all(runs).await;

        incidents
    }

    /// The canonical incident store.
    pub fn incidents(&self) -> &IncidentStore {
        &self.incidents
    }

    /// The response tracking store.
    pub fn responses(&self) -> &ResponseStore {
        &self.responses
    }

    /// The detection engine, for runtime rule toggling.
    pub fn engine(&self) -> &DetectionEngine {
        &self.engine
    }
}
