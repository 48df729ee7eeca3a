// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use laika_core::LaikaError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable error code, see [`LaikaError::code`].
    pub error: String,
    pub message: String,
}

/// A [`LaikaError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub LaikaError);

impl From<LaikaError> for ApiError {
    fn from(e: LaikaError) -> Self {
        Self(e)
    }
}

pub fn status_for(error: &LaikaError) -> StatusCode {
    match error {
        LaikaError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        LaikaError::NotFound { .. } => StatusCode::NOT_FOUND,
        LaikaError::Value(_) | LaikaError::Service(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.code(), "request failed");
        } else {
            tracing::debug!(error = %self.0, code = self.0.code(), "request rejected");
        }
        let body = ErrorResponse {
            error: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_statuses() {
        assert_eq!(status_for(&LaikaError::PermissionDenied("no".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&LaikaError::NotFound {
                resource: "comment c9".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_for(&LaikaError::Value("bad".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(&LaikaError::Service("gone".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(&LaikaError::Cancelled), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
