use std::convert::Infallible;
use warp::Filter;

use crate::infrastructure::web::response::json_reply;
use crate::infrastructure::web::webserver::{with_state, AppState};

/// `GET /devices`: registry snapshot, online and offline.
pub fn route(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("devices")
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_devices)
}

async fn handle_devices(state: AppState) -> Result<warp::reply::Response, Infallible> {
    Ok(json_reply(&state.registry.snapshot().await))
}
