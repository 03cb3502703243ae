//! Security event model for Aegis Responder.
//!
//! Events are immutable records produced by upstream systems (request
//! middleware, auth services, queue consumers) and pushed into the
//! detection engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A security-relevant event observed by an upstream producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Originating system or network source (host, service, or address).
    pub source: String,
    /// Event category (e.g., "auth_failure", "http_request", "data_access").
    pub event_type: String,
    /// Acting user, if known.
    pub user_id: Option<String>,
    /// Client IP address, if known.
    pub ip_address: Option<String>,
    /// Client user agent, if known.
    pub user_agent: Option<String>,
    /// Endpoint or resource path involved.
    pub endpoint: Option<String>,
    /// HTTP method, for request-shaped events.
    pub method: Option<String>,
    /// HTTP status code, for request-shaped events.
    pub status_code: Option<u16>,
    /// Handler latency in milliseconds, for request-shaped events.
    pub response_time_ms: Option<u64>,
    /// Raw payload excerpt (body, query string) for signature matching.
    pub payload: Option<String>,
    /// Additional producer-specific context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SecurityEvent {
    /// Creates a new event stamped with the current time.
    pub fn new(source: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            event_type: event_type.into(),
            user_id: None,
            ip_address: None,
            user_agent: None,
            endpoint: None,
            method: None,
            status_code: None,
            response_time_ms: None,
            payload: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the event timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the acting user.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the client IP address.
    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    /// Sets the client user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the endpoint path.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the HTTP status code.
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Sets the handler latency.
    pub fn with_response_time_ms(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }

    /// Sets the raw payload excerpt.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
