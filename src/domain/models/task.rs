// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::models::business::Business;

/// 任务在工作计划中的序号
pub type TaskId = usize;

/// 抓取任务实体
///
/// 表示一个（地点, 类别）组合的工作单元及其执行结果。
/// 任务在整个运行期间由编排器独占持有，不会跨会话共享。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeTask {
    /// 任务序号（按计划生成顺序）
    pub id: TaskId,
    /// 目标地点
    pub location: String,
    /// 目标类别
    pub category: String,
    /// 任务状态
    pub status: TaskStatus,
    /// 任务产出的商户记录
    pub businesses: Vec<Business>,
    /// 失败原因
    pub error: Option<String>,
    /// 已尝试次数
    pub attempts: u32,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间
    pub finished_at: Option<DateTime<Utc>>,
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → Running → Succeeded/Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 等待派发
    #[default]
    Pending,
    /// 执行中
    Running,
    /// 执行成功
    Succeeded,
    /// 执行失败
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    /// 无效的状态转换，当任务状态转换不符合业务规则时发生
    #[error("Invalid task state transition from {0}")]
    InvalidStateTransition(TaskStatus),
}

impl ScrapeTask {
    /// 创建一个新的待派发任务
    pub fn new(id: TaskId, location: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id,
            location: location.into(),
            category: category.into(),
            status: TaskStatus::Pending,
            businesses: Vec::new(),
            error: None,
            attempts: 0,
            started_at: None,
            finished_at: None,
        }
    }

    /// 启动任务
    ///
    /// 将任务状态从Pending变更为Running
    pub fn start(&mut self) -> Result<(), DomainError> {
        match self.status {
            TaskStatus::Pending => {
                self.status = TaskStatus::Running;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other)),
        }
    }

    /// 标记任务成功
    pub fn succeed(&mut self, businesses: Vec<Business>, attempts: u32) -> Result<(), DomainError> {
        match self.status {
            TaskStatus::Running => {
                self.status = TaskStatus::Succeeded;
                self.businesses = businesses;
                self.attempts = attempts;
                self.finished_at = Some(Utc::now());
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other)),
        }
    }

    /// 标记任务失败
    pub fn fail(&mut self, reason: impl Into<String>, attempts: u32) -> Result<(), DomainError> {
        match self.status {
            TaskStatus::Running => {
                self.status = TaskStatus::Failed;
                self.error = Some(reason.into());
                self.attempts = attempts;
                self.finished_at = Some(Utc::now());
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition(other)),
        }
    }

    pub fn businesses_found(&self) -> usize {
        self.businesses.len()
    }

    /// 任务是否已结束
    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}
