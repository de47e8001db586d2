use serde_json::json;
use std::convert::Infallible;
use warp::Filter;

use crate::infrastructure::web::response::{error_to_reply, json_reply};
use crate::infrastructure::web::webserver::{with_state, AppState};

/// `DELETE /delete/{id}`: explicit device-initiated delete.
pub fn route(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("delete" / String)
        .and(warp::delete())
        .and(with_state(state))
        .and_then(handle_delete)
}

async fn handle_delete(id: String, state: AppState) -> Result<warp::reply::Response, Infallible> {
    match state.coordinator.delete_item(&id).await {
        Ok(()) => Ok(json_reply(&json!({ "ok": true }))),
        Err(e) => Ok(error_to_reply(&e)),
    }
}
