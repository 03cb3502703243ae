//! Shared connector types and the mock failure-injection model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in connectors.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Outcome of blocking a source address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockOutcome {
    /// The blocked address.
    pub ip: String,
    /// When the block lapses.
    pub blocked_until: DateTime<Utc>,
    /// Identifier of the created firewall rule.
    pub rule_ref: String,
}

/// One permission grant returned by an identity audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub user_id: String,
    pub permission: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
}

/// A log search request used for evidence collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQuery {
    /// Log source to search (e.g., "auth", "requests", "permissions").
    pub source: String,
    /// Free-text filter, if any.
    pub filter: Option<String>,
    /// Maximum records to return.
    pub limit: usize,
}

impl LogQuery {
    /// Creates a query against one log source.
    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filter: None,
            limit: 100,
        }
    }

    /// Sets the free-text filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the record limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// One log record returned from a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub line: String,
}

/// Failure injection for mock connectors.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Every call succeeds.
    #[default]
    Normal,
    /// Every call fails with the given message.
    AlwaysFail(String),
    /// Calls fail once the 1-based call count exceeds `calls`.
    FailAfter { calls: u64, message: String },
    /// The first `calls` calls fail, then the connector recovers.
    FailFor { calls: u64, message: String },
}

impl MockBehavior {
    /// Returns the injected error for the given 1-based call count, if any.
    pub fn check(&self, call: u64) -> ConnectorResult<()> {
        match self {
            MockBehavior::Normal => Ok(()),
            MockBehavior::AlwaysFail(message) => {
                Err(ConnectorError::RequestFailed(message.clone()))
            }
            MockBehavior::FailAfter { calls, message } => {
                if call > *calls {
                    Err(ConnectorError::RequestFailed(message.clone()))
                } else {
                    Ok(())
                }
            }
            MockBehavior::FailFor { calls, message } => {
                if call <= *calls {
                    Err(ConnectorError::RequestFailed(message.clone()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_after_behavior() {
        let behavior = MockBehavior::FailAfter {
            calls: 2,
            message: "degraded".into(),
        };
        assert!(behavior.check(1).is_ok());
        assert!(behavior.check(2).is_ok());
        assert!(behavior.check(3).is_err());
    }

    #[test]
    fn test_fail_for_recovers() {
        let behavior = MockBehavior::FailFor {
            calls: 2,
            message: "transient".into(),
        };
        assert!(behavior.check(1).is_err());
        assert!(behavior.check(2).is_err());
        assert!(behavior.check(3).is_ok());
    }

    #[test]
    fn test_always_fail_behavior() {
        let behavior = MockBehavior::AlwaysFail("down".into());
        assert!(matches!(
            behavior.check(1),
            Err(ConnectorError::RequestFailed(_))
        ));
    }
}
