// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::dto::session_request::{LookupRequestDto, StartSessionRequestDto};
use crate::application::dto::session_response::{
    ControlResponseDto, LookupResponseDto, SessionStatusResponseDto, StartSessionResponseDto,
};
use crate::application::use_cases::scrape_session_use_case::ScrapeSessionUseCase;
use crate::presentation::errors::AppError;

/// 创建并启动抓取会话
pub async fn start_session(
    Extension(use_case): Extension<Arc<ScrapeSessionUseCase>>,
    Json(payload): Json<StartSessionRequestDto>,
) -> Result<(StatusCode, Json<StartSessionResponseDto>), AppError> {
    let response = use_case.start(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// 暂停会话
pub async fn pause_session(
    Extension(use_case): Extension<Arc<ScrapeSessionUseCase>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ControlResponseDto>, AppError> {
    Ok(Json(use_case.pause(id).await?))
}

/// 恢复会话
pub async fn resume_session(
    Extension(use_case): Extension<Arc<ScrapeSessionUseCase>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ControlResponseDto>, AppError> {
    Ok(Json(use_case.resume(id).await?))
}

/// 停止会话
pub async fn stop_session(
    Extension(use_case): Extension<Arc<ScrapeSessionUseCase>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ControlResponseDto>, AppError> {
    Ok(Json(use_case.stop(id).await?))
}

/// 读取会话状态
pub async fn get_session_status(
    Extension(use_case): Extension<Arc<ScrapeSessionUseCase>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatusResponseDto>, AppError> {
    Ok(Json(use_case.status(id).await?))
}

/// 查询单个号码的运营商
pub async fn lookup_provider(
    Extension(use_case): Extension<Arc<ScrapeSessionUseCase>>,
    Json(payload): Json<LookupRequestDto>,
) -> Result<Json<LookupResponseDto>, AppError> {
    Ok(Json(use_case.lookup(payload).await?))
}
