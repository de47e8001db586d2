use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Local device identity, generated once at first run and persisted next to
/// the item data. The id is the stable identifier presented at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
}

impl DeviceIdentity {
    /// Read the identity record, or mint and persist a fresh one.
    ///
    /// An unreadable record is replaced rather than treated as fatal; losing
    /// an identity only means the device re-registers under a new id.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            match fs::read_to_string(path)
                .map_err(anyhow::Error::from)
                .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from))
            {
                Ok(identity) => return Ok(identity),
                Err(e) => warn!("Unreadable device identity at {:?} ({}), recreating", path, e),
            }
        }

        let suffix: String = Uuid::new_v4().simple().to_string();
        let identity = Self {
            id: Uuid::new_v4().to_string(),
            name: format!("device-{}", &suffix[..4]),
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create identity dir failed: {}", dir.display()))?;
        }
        fs::write(path, serde_json::to_string_pretty(&identity)?)
            .with_context(|| format!("write identity failed: {}", path.display()))?;
        Ok(identity)
    }
}
