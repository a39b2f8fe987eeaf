//! HTTP error responses.
//!
//! Every error leaves the service as `{"error":{"code","message"}}` with a
//! status derived from its [`ErrorCode`] and `Cache-Control: no-store`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::{ErrorCode, ExtractionError, HuginnError};

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// An error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendUnavailable, message)
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.code)
    }
}

/// HTTP status of an error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::BackendDisabled => StatusCode::NOT_IMPLEMENTED,
        ErrorCode::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::NoTextExtracted => StatusCode::FAILED_DEPENDENCY,
        ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
        // Degraded decodes answer 200 with an empty result; reaching here is a bug.
        ErrorCode::DecodeDegraded | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<HuginnError> for ApiError {
    fn from(err: HuginnError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(ErrorCode::InvalidInput, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.code {
            ErrorCode::Internal | ErrorCode::DecodeDegraded => {
                tracing::error!(detail = %self.message, code = %self.code, "API internal error");
                "An internal error occurred".to_string()
            }
            _ => {
                tracing::warn!(code = %self.code, status = status.as_u16(), error = %self.message, "request failed");
                self.message
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.as_str(),
                message,
            },
        };
        no_store((status, Json(body)).into_response())
    }
}

/// Mark a response as uncacheable.
pub fn no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
