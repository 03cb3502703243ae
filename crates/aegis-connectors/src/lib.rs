//! # aegis-connectors
//!
//! Capability ports for Aegis Responder: firewall, identity, endpoint,
//! monitoring, notification, and evidence storage.
//!
//! This crate defines the trait seams the response engine acts through and
//! ships mock implementations with call recording and failure injection for
//! tests. Concrete vendor integrations live outside this repository and
//! implement the same traits.

pub mod endpoint;
pub mod evidence;
pub mod firewall;
pub mod identity;
pub mod monitoring;
pub mod notify;
pub mod traits;

pub use endpoint::{EndpointConnector, MockEndpointConnector};
pub use evidence::{EvidenceStore, MockEvidenceStore};
pub use firewall::{FirewallConnector, MockFirewallConnector};
pub use identity::{IdentityConnector, MockIdentityConnector};
pub use monitoring::{MockMonitoringConnector, MonitoringConnector};
pub use notify::MockNotifier;
pub use traits::{
    BlockOutcome, ConnectorError, ConnectorResult, LogQuery, LogRecord, MockBehavior,
    PermissionGrant,
};
