use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::Filter;

use crate::core::AckOutcome;
use crate::infrastructure::web::response::{error_reply, error_to_reply, json_reply};
use crate::infrastructure::web::webserver::{with_state, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutRequest {
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteAckRequest {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// Item listing plus the two cut-protocol endpoints.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let list = warp::path!("items")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_list);

    let get = warp::path!("items" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_get);

    let cut = warp::path!("items" / String / "cut")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_cut);

    let paste_ack = warp::path!("items" / String / "paste-ack")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(handle_paste_ack);

    list.or(get).or(cut).or(paste_ack)
}

async fn handle_list(state: AppState) -> Result<warp::reply::Response, Infallible> {
    Ok(json_reply(&state.store.list().await))
}

async fn handle_get(id: String, state: AppState) -> Result<warp::reply::Response, Infallible> {
    match state.store.get(&id).await {
        Some(item) => Ok(json_reply(&item)),
        None => Ok(error_reply(StatusCode::NOT_FOUND, "item not found")),
    }
}

async fn handle_cut(
    id: String,
    body: CutRequest,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let Some(owner) = body.owner_id.filter(|o| !o.trim().is_empty()) else {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "ownerId required"));
    };
    let ttl = body.ttl_seconds.unwrap_or(state.default_ttl_seconds);
    match state.coordinator.create_cut(&id, &owner, ttl).await {
        Ok(item) => Ok(json_reply(&item)),
        Err(e) => Ok(error_to_reply(&e)),
    }
}

async fn handle_paste_ack(
    id: String,
    body: PasteAckRequest,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let (Some(device_id), Some(token)) = (
        body.device_id.filter(|d| !d.trim().is_empty()),
        body.token.filter(|t| !t.trim().is_empty()),
    ) else {
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "deviceId and token required",
        ));
    };

    match state.coordinator.acknowledge(&id, &device_id, &token).await {
        Ok(AckOutcome::Pending(pending)) => {
            Ok(json_reply(&json!({ "ok": true, "pending": pending })))
        }
        Ok(AckOutcome::Deleted) => Ok(json_reply(&json!({ "ok": true, "deleted": true }))),
        Err(e) => Ok(error_to_reply(&e)),
    }
}
