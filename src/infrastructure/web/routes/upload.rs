use bytes::BufMut;
use futures_util::{StreamExt, TryStreamExt};
use log::error;
use serde::Deserialize;
use std::convert::Infallible;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::Filter;

use crate::infrastructure::web::response::{error_reply, error_to_reply, json_reply};
use crate::infrastructure::web::webserver::{with_state, AppState};

const MAX_UPLOAD_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct TextUpload {
    text: String,
}

/// `POST /upload`: multipart `file` (or `text`) part, or a JSON `{text}` body.
pub fn route(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let multipart = warp::path!("upload")
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_state(state.clone()))
        .and_then(handle_multipart);

    let text = warp::path!("upload")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(handle_text);

    multipart.or(text)
}

async fn handle_text(
    body: TextUpload,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    match state.store.add_text(body.text).await {
        Ok(item) => Ok(json_reply(&item)),
        Err(e) => Ok(error_to_reply(&e)),
    }
}

async fn handle_multipart(
    mut form: FormData,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    while let Some(part) = form.next().await {
        let part = match part {
            Ok(p) => p,
            Err(e) => {
                error!("Malformed multipart body: {}", e);
                return Ok(error_reply(StatusCode::BAD_REQUEST, "malformed multipart body"));
            }
        };

        let field = part.name().to_string();
        match field.as_str() {
            "text" => {
                let data = match read_part(part).await {
                    Ok(d) => d,
                    Err(_) => {
                        return Ok(error_reply(StatusCode::BAD_REQUEST, "unreadable text part"))
                    }
                };
                let text = String::from_utf8_lossy(&data).into_owned();
                return match state.store.add_text(text).await {
                    Ok(item) => Ok(json_reply(&item)),
                    Err(e) => Ok(error_to_reply(&e)),
                };
            }
            "file" => {
                let display_name = part.filename().unwrap_or("upload.bin").to_string();
                let mime_type = part
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();

                // Stream into the store's tmp dir chunk by chunk; the body
                // never sits in memory, and the final blob placement is a
                // same-filesystem rename.
                let tmp_path = state.store.tmp_dir().join(Uuid::new_v4().to_string());
                if let Err(e) = spool_part(part, &tmp_path).await {
                    error!("Failed to spool upload: {}", e);
                    let _ = tokio::fs::remove_file(&tmp_path).await;
                    return Ok(error_reply(StatusCode::BAD_REQUEST, "unreadable file part"));
                }

                return match state
                    .store
                    .add_file(&display_name, &tmp_path, &mime_type)
                    .await
                {
                    Ok(item) => Ok(json_reply(&item)),
                    Err(e) => Ok(error_to_reply(&e)),
                };
            }
            _ => {} // unknown parts are ignored
        }
    }

    Ok(error_reply(StatusCode::BAD_REQUEST, "no file or text field"))
}

/// Drain a part into `dest` without buffering it whole.
async fn spool_part(part: Part, dest: &Path) -> io::Result<()> {
    let file = File::create(dest).await?;
    let mut file = part
        .stream()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        .try_fold(file, |mut file, mut chunk| async move {
            file.write_all_buf(&mut chunk).await?;
            Ok(file)
        })
        .await?;
    file.flush().await?;
    Ok(())
}

/// Small in-memory read, for the `text` part only.
async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut acc, data| {
            acc.put(data);
            async move { Ok(acc) }
        })
        .await
}
