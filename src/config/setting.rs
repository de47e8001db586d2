use super::utils::get_setting_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    /// Port for the HTTP API and the WebSocket endpoint.
    #[serde(default = "default_webserver_port")]
    pub webserver_port: u16,
    /// Default time-to-live for a cut when the request does not carry one.
    #[serde(default = "default_cut_ttl_seconds")]
    pub cut_ttl_seconds: u64,
    /// Cadence of the background pass that expires overdue cuts.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    /// Overrides the default data directory when set.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_webserver_port() -> u16 {
    3000
}

fn default_cut_ttl_seconds() -> u64 {
    300
}

fn default_sweep_interval_seconds() -> u64 {
    30
}

impl Default for Setting {
    fn default() -> Self {
        Self {
            webserver_port: default_webserver_port(),
            cut_ttl_seconds: default_cut_ttl_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            data_dir: None,
        }
    }
}

impl Setting {
    /// Load settings from the given path, or the default location.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => get_setting_path()?,
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("read settings failed: {}", path.display()))?;
        let setting = serde_json::from_str(&content)
            .with_context(|| format!("parse settings failed: {}", path.display()))?;
        Ok(setting)
    }

    /// Save settings to the given path, or the default location.
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let path = match path {
            Some(p) => p,
            None => get_setting_path()?,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create settings dir failed: {}", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .with_context(|| format!("write settings failed: {}", path.display()))?;
        Ok(())
    }
}
