//! # aegis-actions
//!
//! Action execution for Aegis Responder.
//!
//! This crate implements the orchestrator's seams: the [`ActionExecutor`]
//! that maps playbook action types onto connector calls, and the
//! [`EvidenceCollector`] that gathers type-specific supporting evidence.

pub mod evidence;
pub mod executor;

pub use evidence::EvidenceCollector;
pub use executor::ActionExecutor;
