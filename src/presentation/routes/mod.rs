// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;

use crate::application::use_cases::scrape_session_use_case::ScrapeSessionUseCase;
use crate::presentation::handlers::session_handler;

/// 创建应用路由
///
/// # 参数
///
/// * `use_case` - 会话控制面，以 Extension 形式注入各处理器
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(use_case: Arc<ScrapeSessionUseCase>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let session_routes = Router::new()
        .route("/v1/sessions", post(session_handler::start_session))
        .route("/v1/sessions/{id}", get(session_handler::get_session_status))
        .route("/v1/sessions/{id}/pause", post(session_handler::pause_session))
        .route("/v1/sessions/{id}/resume", post(session_handler::resume_session))
        .route("/v1/sessions/{id}/stop", post(session_handler::stop_session))
        .route("/v1/lookup", post(session_handler::lookup_provider))
        .layer(Extension(use_case));

    Router::new().merge(public_routes).merge(session_routes)
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
