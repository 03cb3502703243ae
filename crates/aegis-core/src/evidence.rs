//! Evidence items collected in support of an incident response.
//!
//! Items are append-only and carry a SHA-256 content hash computed at
//! construction so later tampering is detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Kinds of evidence the collector can produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    LogEntry,
    NetworkTraffic,
    FileSystem,
    MemoryDump,
    DatabaseRecord,
    Screenshot,
    Configuration,
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceType::LogEntry => write!(f, "log_entry"),
            EvidenceType::NetworkTraffic => write!(f, "network_traffic"),
            EvidenceType::FileSystem => write!(f, "file_system"),
            EvidenceType::MemoryDump => write!(f, "memory_dump"),
            EvidenceType::DatabaseRecord => write!(f, "database_record"),
            EvidenceType::Screenshot => write!(f, "screenshot"),
            EvidenceType::Configuration => write!(f, "configuration"),
        }
    }
}

/// One captured artifact supporting investigation of an incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Unique identifier.
    pub id: Uuid,
    /// Kind of artifact.
    pub evidence_type: EvidenceType,
    /// What this item captures.
    pub description: String,
    /// When it was collected.
    pub collected_at: DateTime<Utc>,
    /// The captured data.
    pub data: serde_json::Value,
    /// SHA-256 hex digest of the serialized data, set at construction.
    pub integrity_hash: String,
}

impl EvidenceItem {
    /// Creates an item, hashing `data` for later integrity verification.
    pub fn new(
        evidence_type: EvidenceType,
        description: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        let integrity_hash = Self::hash(&data);
        Self {
            id: Uuid::new_v4(),
            evidence_type,
            description: description.into(),
            collected_at: Utc::now(),
            data,
            integrity_hash,
        }
    }

    /// Recomputes the hash and compares it with the stored one.
    pub fn verify_integrity(&self) -> bool {
        Self::hash(&self.data) == self.integrity_hash
    }

    fn hash(data: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.to_string().as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_hash_verifies() {
        let item = EvidenceItem::new(
            EvidenceType::LogEntry,
            "auth log excerpt",
            serde_json::json!({"lines": ["failed login u-1", "failed login u-1"]}),
        );
        assert!(item.verify_integrity());
        assert_eq!(item.integrity_hash.len(), 64);
    }

    #[test]
    fn test_tampering_detected() {
        let mut item = EvidenceItem::new(
            EvidenceType::DatabaseRecord,
            "query audit",
            serde_json::json!({"rows": 3}),
        );
        item.data = serde_json::json!({"rows": 30000});
        assert!(!item.verify_integrity());
    }
}
