use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

use crate::error::Error;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

pub fn json_reply<T: Serialize>(value: &T) -> Response {
    reply::json(value).into_response()
}

/// Structured failure body, `{"error": "..."}`.
pub fn error_reply(status: StatusCode, message: &str) -> Response {
    reply::with_status(reply::json(&ErrorBody { error: message }), status).into_response()
}

/// Map a coordinator error onto the HTTP surface.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::TokenMismatch => StatusCode::FORBIDDEN,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Io(_) | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_to_reply(err: &Error) -> Response {
    error_reply(status_for(err), &err.to_string())
}
