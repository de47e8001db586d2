use anyhow::Result;
use log::info;
use std::convert::Infallible;
use std::net::SocketAddr;
use warp::Filter;

use super::{handlers, routes};
use crate::core::{CutCoordinator, DeviceRegistry};
use crate::infrastructure::storage::ItemStore;

/// Shared handles injected into every route. Constructed once at startup;
/// no module-level singletons. Event delivery goes through the coordinator,
/// which owns the notification router.
#[derive(Clone)]
pub struct AppState {
    pub store: ItemStore,
    pub registry: DeviceRegistry,
    pub coordinator: CutCoordinator,
    pub default_ttl_seconds: u64,
}

pub struct WebServer {
    addr: SocketAddr,
    state: AppState,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    pub async fn run(self) -> Result<()> {
        info!("HTTP API and live channel listening on {}", self.addr);
        warp::serve(build_routes(self.state)).run(self.addr).await;
        Ok(())
    }
}

/// Inject shared state into a filter chain.
pub fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn build_routes(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    routes::items::routes(state.clone())
        .or(routes::upload::route(state.clone()))
        .or(routes::download::route(state.clone()))
        .or(routes::devices::route(state.clone()))
        .or(routes::delete::route(state.clone()))
        .or(handlers::websocket::route(state))
}
