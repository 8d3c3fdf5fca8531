use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Wraps any displayable error into a `{"reason": ...}` JSON body at the
/// given status, logging it at `error` on the way out.
pub fn err_resp<T: std::fmt::Display>(e: T, code: StatusCode) -> Response {
    let reason = e.to_string();
    tracing::error!(%reason, status = %code, "request failed");
    (code, Json(serde_json::json!({ "reason": reason }))).into_response()
}

pub fn not_found<T: std::fmt::Display>(e: T) -> Response {
    err_resp(e, StatusCode::NOT_FOUND)
}

pub fn conflict<T: std::fmt::Display>(e: T) -> Response {
    err_resp(e, StatusCode::CONFLICT)
}

pub fn bad_request<T: std::fmt::Display>(e: T) -> Response {
    err_resp(e, StatusCode::BAD_REQUEST)
}

pub fn internal_server_error<T: std::fmt::Display>(e: T) -> Response {
    err_resp(e, StatusCode::INTERNAL_SERVER_ERROR)
}
