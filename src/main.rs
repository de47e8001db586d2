use anyhow::{Context, Result};
use log::{info, warn};
use std::net::SocketAddr;
use std::time::Duration;

use lanclip::config::{get_data_dir, DeviceIdentity, Setting};
use lanclip::{
    spawn_sweeper, AppState, CutCoordinator, DeviceRegistry, ItemStore, NotificationRouter,
    WebServer,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let setting = match Setting::load(None) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to load settings ({}), using defaults", e);
            let default = Setting::default();
            if let Err(e) = default.save(None) {
                warn!("Failed to save default settings: {}", e);
            }
            default
        }
    };

    let data_dir = match &setting.data_dir {
        Some(dir) => dir.clone(),
        None => get_data_dir()?,
    };
    let identity = DeviceIdentity::load_or_create(&data_dir.join("device.json"))
        .context("load device identity")?;
    info!("Coordinator identity: {} ({})", identity.name, identity.id);

    let store = ItemStore::open(data_dir.clone()).context("open item store")?;
    let registry = DeviceRegistry::new();
    let router = NotificationRouter::new(registry.clone());
    let coordinator = CutCoordinator::new(store.clone(), registry.clone(), router);

    spawn_sweeper(
        coordinator.clone(),
        Duration::from_secs(setting.sweep_interval_seconds.max(1)),
    );

    let state = AppState {
        store,
        registry,
        coordinator,
        default_ttl_seconds: setting.cut_ttl_seconds,
    };
    let addr: SocketAddr = ([0, 0, 0, 0], setting.webserver_port).into();
    WebServer::new(addr, state).run().await
}
