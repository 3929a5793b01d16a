//! Response construction.
//!
//! # Responsibilities
//! - Serve image bytes with their content type
//! - Map lookup failures to status codes with a short JSON body
//!
//! # Design Decisions
//! - Error bodies never carry retry counts, timings or origin details

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::gateway::LookupError;
use crate::origin::{CardImage, DEFAULT_CONTENT_TYPE};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl LookupError {
    pub fn status(&self) -> StatusCode {
        match self {
            LookupError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            LookupError::NotFound => StatusCode::NOT_FOUND,
            LookupError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            LookupError::Upstream => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LookupError::InvalidKey(_) => "invalid_key",
            LookupError::NotFound => "not_found",
            LookupError::ServiceUnavailable => "service_unavailable",
            LookupError::Upstream => "upstream_error",
        }
    }
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// 200 with the image bytes. An unusable origin content type falls back to JPEG.
pub fn image_response(image: CardImage) -> Response {
    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    ([(header::CONTENT_TYPE, content_type)], image.bytes).into_response()
}
