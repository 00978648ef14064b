// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::application::use_cases::scrape_session_use_case::SessionUseCaseError;
use crate::utils::errors::OrchestratorError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    /// 根据错误类型选择 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<SessionUseCaseError>() {
            return match err {
                SessionUseCaseError::ValidationError(_) => StatusCode::BAD_REQUEST,
                SessionUseCaseError::Orchestrator(e) => orchestrator_status(e),
            };
        }

        if let Some(err) = self.0.downcast_ref::<OrchestratorError>() {
            return orchestrator_status(err);
        }

        if self.0.downcast_ref::<validator::ValidationErrors>().is_some() {
            return StatusCode::BAD_REQUEST;
        }

        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn orchestrator_status(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::InvalidConcurrencyConfig(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::LookupUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        // Idempotent control is resolved before reaching here
        OrchestratorError::InvalidSessionTransition { .. } => StatusCode::CONFLICT,
        OrchestratorError::TaskFetchError(_) | OrchestratorError::OrchestrationFault(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.0.to_string();

        if status.is_server_error() {
            error!("Request failed: {}", error_message);
        }

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
