use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use restkit_core::{Outcome, RestCode, RestResponse};

/// Put a bound call's outcome on the wire.
pub fn outcome_to_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Envelope(resp) => envelope_response(resp),
        Outcome::Attachment { filename, bytes } => {
            let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
            let mut response = (StatusCode::OK, bytes).into_response();
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            match HeaderValue::from_str(&disposition) {
                Ok(value) => {
                    headers.insert(header::CONTENT_DISPOSITION, value);
                }
                Err(_) => {
                    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
                }
            }
            response
        }
        Outcome::Text { body } => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response(),
    }
}

/// `{status, data, code}` with the matching HTTP status line.
pub fn envelope_response(resp: RestResponse) -> Response {
    let (body, code) = resp.into_parts();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(body)).into_response()
}

/// `{"error": message}` enveloped under `code`.
pub fn json_error(code: RestCode, message: impl Into<String>) -> Response {
    envelope_response(RestResponse::create(
        serde_json::json!({ "error": message.into() }),
        code,
    ))
}
