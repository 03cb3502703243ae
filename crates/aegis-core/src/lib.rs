//! # aegis-core
//!
//! Core detection and response engine for Aegis Responder.
//!
//! This crate provides the event buffer and rule engine, incident data
//! models and store, the alert dispatcher, playbook registry, response
//! orchestrator, and recommendation generator.

pub mod alert;
pub mod buffer;
pub mod engine;
pub mod event;
pub mod evidence;
pub mod incident;
pub mod orchestrator;
pub mod pipeline;
pub mod playbook;
pub mod recommend;
pub mod response;
pub mod rule;

pub use alert::{AlertDispatcher, AlertMessage, AlertPriority, Notifier, NotifyError};
pub use buffer::{BufferConfig, EventBuffer};
pub use engine::{DetectionConfig, DetectionEngine};
pub use event::SecurityEvent;
pub use evidence::{EvidenceItem, EvidenceType};
pub use incident::{
    IncidentStatus, IncidentStore, IncidentStoreError, IncidentType, SecurityIncident, Severity,
};
pub use orchestrator::{
    ActionRunError, ActionRunner, CancelHandle, EvidenceGatherer, OrchestratorConfig,
    ResponseOrchestrator, RetryPolicy,
};
pub use pipeline::SecurityPipeline;
pub use playbook::{
    default_playbooks, ActionCondition, ActionType, ConditionField, ConditionOp, ConditionValue,
    PlaybookAction, PlaybookRegistry, ResponsePlaybook,
};
pub use recommend::RecommendationGenerator;
pub use response::{
    IncidentResponse, ResponseAction, ResponseActionStatus, ResponseResult, ResponseStatus,
    ResponseStore, ResponseType,
};
pub use rule::{default_rules, KeyBy, RuleCheck, RuleError, SecurityRule, SignatureField};
