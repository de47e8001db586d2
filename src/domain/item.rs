use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transient cut sub-state, present only while an item is in flight
/// between devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutState {
    /// Single-use credential minted at cut creation. Every acknowledgment
    /// must present it; re-cutting mints a fresh one, invalidating stale acks.
    pub token: String,
    /// Device that created the cut.
    pub owner: String,
    /// Devices that have not yet acknowledged. Never contains the owner.
    pub pending: Vec<String>,
    /// Absolute time after which the cut auto-expires.
    pub deadline: DateTime<Utc>,
}

impl CutState {
    pub fn new(owner: String, pending: Vec<String>, deadline: DateTime<Utc>) -> Self {
        let mut pending = pending;
        pending.retain(|d| *d != owner);
        pending.dedup();
        Self {
            token: Uuid::new_v4().to_string(),
            owner,
            pending,
            deadline,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline <= now
    }
}

/// Item payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ItemContent {
    #[serde(rename_all = "camelCase")]
    Text { text: String },
    #[serde(rename_all = "camelCase")]
    File {
        /// Original display name as uploaded.
        name: String,
        /// Blob file name inside managed storage, derived from the item id.
        stored_name: String,
        mime_type: String,
        size: u64,
    },
}

/// One clipboard entry. Immutable once created, except for the `cut`
/// sub-record driven by the cut lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(flatten)]
    pub content: ItemContent,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut: Option<CutState>,
}

impl Item {
    pub fn new_text(text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: ItemContent::Text { text },
            created_at: Utc::now(),
            cut: None,
        }
    }

    pub fn is_cut(&self) -> bool {
        self.cut.is_some()
    }

    /// Blob file name, for file items.
    pub fn stored_name(&self) -> Option<&str> {
        match &self.content {
            ItemContent::File { stored_name, .. } => Some(stored_name),
            ItemContent::Text { .. } => None,
        }
    }
}
