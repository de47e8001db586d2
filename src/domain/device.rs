use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Registry view of one device. Entries are created on first registration
/// and kept for the life of the coordinator process; only `online` and
/// `last_seen` change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Stable identifier persisted locally by the device itself.
    pub id: String,
    /// Display label, not guaranteed unique.
    pub name: String,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            online: true,
            last_seen: Utc::now(),
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device(id: {}, name: {})", self.id, self.name)
    }
}
