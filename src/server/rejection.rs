use std::convert::Infallible;

use serde_json::{json, Value};
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, Rejection,
        UnsupportedMediaType,
    },
    reply::{self, Response},
    Reply,
};

use crate::error::ApiError;

fn detail(message: impl Into<String>) -> Value {
    json!({ "detail": message.into() })
}

/// Renders every rejection as a json body with a matching status.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, body) = if let Some(e) = err.find::<ApiError>() {
        if e.status() == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("> {e}");
        }
        (e.status(), e.body())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, detail(e.to_string()))
    } else if err.find::<InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, detail("Invalid query string."))
    } else if err.find::<LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, detail("Content-Length required."))
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, detail("Request body too large."))
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            detail("Expected application/json."),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, detail("Method not allowed."))
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, detail("Not found."))
    } else {
        log::error!("> Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            detail("Internal server error"),
        )
    };

    Ok(reply::with_status(reply::json(&body), status).into_response())
}
