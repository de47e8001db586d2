use log::warn;
use serde::Deserialize;
use std::convert::Infallible;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio_util::io::ReaderStream;
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::Filter;

use crate::domain::item::ItemContent;
use crate::infrastructure::web::response::error_reply;
use crate::infrastructure::web::webserver::{with_state, AppState};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    delete: Option<String>,
}

/// `GET /download/{id}?delete=1`: streams content, optionally deleting the
/// item once the transfer is set up.
pub fn route(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("download" / String)
        .and(warp::get())
        .and(warp::query::<DownloadQuery>())
        .and(with_state(state))
        .and_then(handle_download)
}

async fn handle_download(
    id: String,
    query: DownloadQuery,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let delete_after = query.delete.as_deref() == Some("1");

    let Some(item) = state.store.get(&id).await else {
        return Ok(error_reply(StatusCode::NOT_FOUND, "item not found"));
    };

    match &item.content {
        ItemContent::Text { text } => {
            let body = Body::from(text.clone());
            if delete_after {
                delete_item(&state, &id).await;
            }
            Ok(build_response(
                body,
                "text/plain; charset=utf-8",
                None,
            ))
        }
        ItemContent::File {
            name,
            stored_name,
            mime_type,
            ..
        } => {
            let path = state.store.blob_path(stored_name);
            let file = match File::open(&path).await {
                Ok(f) => f,
                Err(_) => return Ok(error_reply(StatusCode::NOT_FOUND, "file missing")),
            };
            let stream = ReaderStream::new(BufReader::new(file));
            // Unlink after open: the held descriptor keeps the in-flight
            // stream readable.
            if delete_after {
                delete_item(&state, &id).await;
            }
            let disposition = format!("attachment; filename=\"{}\"", name.replace('"', ""));
            Ok(build_response(
                Body::wrap_stream(stream),
                mime_type,
                Some(&disposition),
            ))
        }
    }
}

async fn delete_item(state: &AppState, id: &str) {
    if let Err(e) = state.coordinator.delete_item(id).await {
        warn!("Post-download delete of {} failed: {}", id, e);
    }
}

fn build_response(body: Body, content_type: &str, disposition: Option<&str>) -> warp::reply::Response {
    let mut builder = warp::http::Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type);
    if let Some(d) = disposition {
        builder = builder.header("Content-Disposition", d);
    }
    match builder.body(body) {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Failed to build download response: {}", e);
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}
