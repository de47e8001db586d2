use anyhow::Result;
use std::env;
use std::path::PathBuf;

/// Configuration directory for the coordinator.
pub fn get_config_dir() -> Result<PathBuf> {
    let base_dir =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
    Ok(base_dir.join("lanclip"))
}

/// Settings file path.
///
/// An environment override takes precedence over the system config directory.
pub fn get_setting_path() -> Result<PathBuf> {
    if let Ok(path) = env::var("LANCLIP_SETTING_PATH") {
        return Ok(PathBuf::from(path));
    }
    Ok(get_config_dir()?.join("setting.json"))
}

/// Default data directory (item metadata, blobs, device identity).
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(path) = env::var("LANCLIP_DATA_DIR") {
        return Ok(PathBuf::from(path));
    }
    Ok(get_config_dir()?.join("data"))
}
