use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The mutation a version entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionEvent {
    Create,
    Update,
    Destroy,
}

impl VersionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionEvent::Create => "create",
            VersionEvent::Update => "update",
            VersionEvent::Destroy => "destroy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(VersionEvent::Create),
            "update" => Some(VersionEvent::Update),
            "destroy" => Some(VersionEvent::Destroy),
            _ => None,
        }
    }
}

impl std::fmt::Display for VersionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit entry for one mutation of one record.
///
/// `object` is the full before-image (absent for creates); `object_changes`
/// maps each changed field to its `{old, new}` pair. Entries are append-only;
/// nothing in this crate updates or deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: Uuid,
    pub event: VersionEvent,
    pub actor_id: Option<Uuid>,
    pub item_type: String,
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    pub object_changes: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    pub created_at: DateTime<Utc>,
}
