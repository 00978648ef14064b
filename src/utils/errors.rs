// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::session::SessionStatus;
use crate::domain::repositories::session_repository::RepositoryError;

/// 编排层错误类型
///
/// 控制面误用和编排故障会传播给调用方；任务级与批次级失败只会被记录，
/// 不会经由此类型中断一次运行。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// 会话不存在或已过期
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// 当前状态不允许该状态转换，控制面将其视为无副作用的成功
    #[error("Invalid session transition from {from} to {to}")]
    InvalidSessionTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// 并发配置超出允许范围，在派发任何任务之前拒绝
    #[error("Invalid concurrency config: {0}")]
    InvalidConcurrencyConfig(String),

    /// 单个任务的抓取失败
    #[error("Task fetch error: {0}")]
    TaskFetchError(String),

    /// 所有批次都无法访问运营商解析服务
    #[error("Provider lookup unavailable: {0}")]
    LookupUnavailable(String),

    /// 编排内部故障（例如会话存储不可用），会话将被置为 failed
    #[error("Orchestration fault: {0}")]
    OrchestrationFault(String),
}

impl OrchestratorError {
    /// 是否属于幂等控制的空操作
    pub fn is_noop_transition(&self) -> bool {
        matches!(self, OrchestratorError::InvalidSessionTransition { .. })
    }
}

impl From<RepositoryError> for OrchestratorError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => OrchestratorError::SessionNotFound(id),
            RepositoryError::InvalidTransition { from, to } => {
                OrchestratorError::InvalidSessionTransition { from, to }
            }
            RepositoryError::Unavailable(msg) => OrchestratorError::OrchestrationFault(msg),
        }
    }
}
