// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::business::Business;
use crate::domain::models::log_entry::LogEntry;
use crate::domain::models::session::{Progress, Session, SessionStatus};

/// 仓库错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// 记录未找到
    #[error("Session {0} not found")]
    NotFound(Uuid),
    /// 状态转换不合法
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// 存储不可用
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

/// 状态更新结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// 更新前的状态
    pub previous: SessionStatus,
    /// 更新后的状态
    pub current: SessionStatus,
}

impl StatusChange {
    /// 是否真正发生了变更
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// 会话仓库特质
///
/// 会话状态的唯一可信来源。所有变更操作都必须能在并发任务中安全调用，
/// 由存储自身负责将并发写入线性化，保证追加不丢失、不交错。
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// 创建新会话
    async fn create(&self, session: &Session) -> Result<Session, RepositoryError>;

    /// 根据ID读取完整会话状态
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, RepositoryError>;

    /// 开始一次运行：Idle → Running，重置进度、结果与日志
    async fn begin_run(&self, id: Uuid, total_tasks: usize) -> Result<Session, RepositoryError>;

    /// 原子地更新会话状态
    ///
    /// 目标状态与当前状态相同视为空操作；`error_message` 仅在进入 failed 时记录。
    async fn update_status(
        &self,
        id: Uuid,
        status: SessionStatus,
        error_message: Option<String>,
    ) -> Result<StatusChange, RepositoryError>;

    /// 追加商户记录，返回追加后的总数
    ///
    /// 会话已进入终止状态时不追加，返回 `None`。
    async fn append_businesses(
        &self,
        id: Uuid,
        businesses: Vec<Business>,
    ) -> Result<Option<usize>, RepositoryError>;

    /// 追加日志条目
    async fn append_logs(&self, id: Uuid, entries: Vec<LogEntry>) -> Result<(), RepositoryError>;

    /// 记录一个任务结束事件，返回更新后的进度
    async fn mark_task_finished(&self, id: Uuid) -> Result<Progress, RepositoryError>;

    /// 合并运营商解析结果
    async fn record_providers(
        &self,
        id: Uuid,
        providers: BTreeMap<String, String>,
    ) -> Result<(), RepositoryError>;

    /// 删除会话，返回是否存在
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}
