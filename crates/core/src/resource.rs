//! Resource inventory records as reported by connectors.
//!
//! Records are read-only to the analysis code. Provider-specific type names
//! (`"EC2"`, `"EBS"`, `"in-use"`) are folded into [`ResourceKind`] and
//! [`ResourceState`] at parse time so the engine never matches on strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceKind {
    Compute,
    BlockStorage,
    Other(String),
}

impl ResourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Compute => "compute",
            Self::BlockStorage => "block_storage",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ResourceKind {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "compute" | "ec2" | "vm" | "instance" | "virtual_machine" => Self::Compute,
            "block_storage" | "block-storage" | "ebs" | "volume" | "disk" => Self::BlockStorage,
            _ => Self::Other(raw),
        }
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceState {
    Running,
    Stopped,
    Pending,
    Terminated,
    /// Storage that exists but is not attached.
    Available,
    /// Storage attached to an instance.
    InUse,
    Other(String),
}

impl ResourceState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Pending => "pending",
            Self::Terminated => "terminated",
            Self::Available => "available",
            Self::InUse => "in_use",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ResourceState {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "stopped" | "stopping" => Self::Stopped,
            "pending" => Self::Pending,
            "terminated" | "shutting-down" | "deleted" => Self::Terminated,
            "available" => Self::Available,
            "in-use" | "in_use" => Self::InUse,
            _ => Self::Other(raw),
        }
    }
}

impl From<ResourceState> for String {
    fn from(state: ResourceState) -> Self {
        state.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One inventory entry. `id` is unique within a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub state: ResourceState,
    /// Instance type / storage class, e.g. `"t3.large"` or `"gp3"`.
    #[serde(default)]
    pub instance_type: Option<String>,
    /// Ids of whatever this resource is attached to (instances for volumes).
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Identifier of the connector that reported this record.
    #[serde(default)]
    pub provider: Option<String>,
}

impl ResourceRecord {
    pub fn is_running_compute(&self) -> bool {
        self.kind == ResourceKind::Compute && self.state == ResourceState::Running
    }

    pub fn is_unattached_storage(&self) -> bool {
        self.kind == ResourceKind::BlockStorage && self.attachments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_fold_into_kinds() {
        assert_eq!(ResourceKind::from("EC2".to_string()), ResourceKind::Compute);
        assert_eq!(ResourceKind::from("EBS".to_string()), ResourceKind::BlockStorage);
        assert_eq!(
            ResourceKind::from("S3".to_string()),
            ResourceKind::Other("S3".to_string())
        );
    }

    #[test]
    fn states_parse_provider_spellings() {
        assert_eq!(ResourceState::from("in-use".to_string()), ResourceState::InUse);
        assert_eq!(ResourceState::from("Running".to_string()), ResourceState::Running);
    }

    #[test]
    fn record_deserializes_with_defaults() {
        let json = serde_json::json!({
            "id": "vol-1",
            "type": "EBS",
            "state": "available",
        });
        let record: ResourceRecord = serde_json::from_value(json).unwrap();
        assert!(record.is_unattached_storage());
        assert!(!record.is_running_compute());
        assert!(record.tags.is_empty());
    }

    #[test]
    fn record_serializes_normalized_names() {
        let record = ResourceRecord {
            id: "i-1".into(),
            kind: ResourceKind::Compute,
            state: ResourceState::Running,
            instance_type: Some("t3.large".into()),
            attachments: vec![],
            region: Some("ap-south-1".into()),
            created_at: None,
            tags: BTreeMap::new(),
            provider: Some("aws".into()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "compute");
        assert_eq!(json["state"], "running");
        assert!(record.is_running_compute());
    }
}
