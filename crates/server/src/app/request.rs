//! Turning an HTTP request into [`RequestParams`].

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{HeaderMap, header};
use thiserror::Error;

use restkit_core::{RequestParams, UploadedFile};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Request body exceeds the maximum content length of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Failed to decode JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read multipart body: {0}")]
    Multipart(String),
}

/// Query string, then whichever body the content type announces.
///
/// Bodies over `limit` bytes are rejected before parsing.
pub async fn extract(req: Request, limit: Option<usize>) -> Result<RequestParams, RequestError> {
    let (parts, body) = req.into_parts();
    let mut params = RequestParams::from_query(parse_pairs(parts.uri.query().unwrap_or("")));

    let limit = limit.unwrap_or(usize::MAX);
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| RequestError::TooLarge { limit })?;
    if bytes.is_empty() {
        return Ok(params);
    }

    match BodyKind::of(&parts.headers) {
        BodyKind::Json => {
            params.json = Some(serde_json::from_slice(&bytes)?);
        }
        BodyKind::UrlEncoded => {
            params.form = parse_pairs(&String::from_utf8_lossy(&bytes));
        }
        BodyKind::Multipart => {
            let req = Request::from_parts(parts, Body::from(bytes));
            let mut multipart = Multipart::from_request(req, &())
                .await
                .map_err(|e| RequestError::Multipart(e.body_text()))?;
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| RequestError::Multipart(e.body_text()))?
            {
                let name = field.name().unwrap_or_default().to_string();
                match field.file_name().map(str::to_string) {
                    Some(filename) => {
                        let bytes = field
                            .bytes()
                            .await
                            .map_err(|e| RequestError::Multipart(e.body_text()))?;
                        params.files.push(UploadedFile {
                            field: name,
                            filename,
                            bytes: bytes.to_vec(),
                        });
                    }
                    None => {
                        let text = field
                            .text()
                            .await
                            .map_err(|e| RequestError::Multipart(e.body_text()))?;
                        params.form.push((name, text));
                    }
                }
            }
        }
        BodyKind::Other => {}
    }
    Ok(params)
}

enum BodyKind {
    Json,
    UrlEncoded,
    Multipart,
    Other,
}

impl BodyKind {
    fn of(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let mime = content_type.split(';').next().unwrap_or("").trim();
        if mime == "application/json" || mime.ends_with("+json") {
            BodyKind::Json
        } else if mime == "application/x-www-form-urlencoded" {
            BodyKind::UrlEncoded
        } else if mime == "multipart/form-data" {
            BodyKind::Multipart
        } else {
            BodyKind::Other
        }
    }
}

fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes()).into_owned().collect()
}
