// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::models::business::Business;
use crate::domain::models::log_entry::LogEntry;
use crate::utils::errors::OrchestratorError;

/// 抓取会话实体
///
/// 表示一次完整的抓取运行，包含状态、并发配置、进度、
/// 已收集的商户记录以及运行日志。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// 会话唯一标识符
    pub id: Uuid,
    /// 会话状态
    pub status: SessionStatus,
    /// 本次运行的并发配置，运行期间只读
    pub concurrency: ConcurrencyConfig,
    /// 运行进度，仅由任务完成事件推导
    pub progress: Progress,
    /// 已收集的商户记录（运行期间只追加）
    pub businesses: Vec<Business>,
    /// 运行日志（运行期间只追加，存储侧不设上限）
    pub logs: Vec<LogEntry>,
    /// 电话号码到运营商名称的映射
    pub providers: BTreeMap<String, String>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 开始运行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
    /// 进入终止状态的时间，只设置一次
    pub completed_at: Option<DateTime<Utc>>,
    /// 失败原因，仅在 failed 状态下设置
    pub error_message: Option<String>,
}

impl Session {
    /// 创建一个处于 idle 状态的新会话
    pub fn new(concurrency: ConcurrencyConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Idle,
            concurrency,
            progress: Progress::default(),
            businesses: Vec::new(),
            logs: Vec::new(),
            providers: BTreeMap::new(),
            created_at: now,
            started_at: None,
            updated_at: now,
            completed_at: None,
            error_message: None,
        }
    }

    /// 应用状态转换
    ///
    /// 目标状态与当前状态相同时返回 `Ok(false)`，不产生任何副作用；
    /// 不合法的转换返回 `InvalidSessionTransition`。
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 状态已变更
    /// * `Ok(false)` - 幂等空操作
    /// * `Err(OrchestratorError)` - 转换不合法
    pub fn transition(
        &mut self,
        next: SessionStatus,
        error_message: Option<String>,
    ) -> Result<bool, OrchestratorError> {
        if self.status == next {
            return Ok(false);
        }

        if !self.status.can_transition_to(next) {
            return Err(OrchestratorError::InvalidSessionTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        self.status = next;
        self.updated_at = now;

        if next == SessionStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if next.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        if next == SessionStatus::Failed {
            self.error_message = error_message;
        }

        Ok(true)
    }
}

/// 会话状态枚举
///
/// 状态转换遵循以下流程：
/// Idle → Running ⇄ Paused，Running/Paused → Stopped/Completed/Failed
/// 后三者为终止状态，不允许再转换。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// 已创建，尚未开始派发
    #[default]
    Idle,
    /// 运行中
    Running,
    /// 已暂停，不再派发新任务
    Paused,
    /// 已被停止
    Stopped,
    /// 全部任务已结束
    Completed,
    /// 编排层故障
    Failed,
}

impl SessionStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Stopped | SessionStatus::Completed | SessionStatus::Failed
        )
    }

    /// 判断能否转换到目标状态（不含自环）
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;

        matches!(
            (*self, next),
            (Idle, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Stopped)
                | (Running, Completed)
                | (Running, Failed)
                | (Paused, Stopped)
                | (Paused, Completed)
                | (Paused, Failed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Paused => write!(f, "paused"),
            SessionStatus::Stopped => write!(f, "stopped"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SessionStatus::Idle),
            "running" => Ok(SessionStatus::Running),
            "paused" => Ok(SessionStatus::Paused),
            "stopped" => Ok(SessionStatus::Stopped),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 并发配置
///
/// 三个相互独立的并发上限，在一次运行期间保持不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyConfig {
    /// 同时处理的地点数（1..=5）
    pub simultaneous_locations: usize,
    /// 每个地点内同时处理的类别数（1..=10）
    pub simultaneous_categories: usize,
    /// 同时在途的运营商查询批次数（1..=20）
    pub simultaneous_lookups: usize,
}

impl ConcurrencyConfig {
    pub const MAX_LOCATIONS: usize = 5;
    pub const MAX_CATEGORIES: usize = 10;
    pub const MAX_LOOKUPS: usize = 20;

    /// 校验并发配置是否在允许范围内
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let checks = [
            ("simultaneousLocations", self.simultaneous_locations, Self::MAX_LOCATIONS),
            ("simultaneousCategories", self.simultaneous_categories, Self::MAX_CATEGORIES),
            ("simultaneousLookups", self.simultaneous_lookups, Self::MAX_LOOKUPS),
        ];

        for (name, value, max) in checks {
            if value < 1 || value > max {
                return Err(OrchestratorError::InvalidConcurrencyConfig(format!(
                    "{} must be between 1 and {}, got {}",
                    name, max, value
                )));
            }
        }

        Ok(())
    }

    /// 将越界的值收敛到允许范围内
    pub fn clamped(self) -> Self {
        Self {
            simultaneous_locations: self.simultaneous_locations.clamp(1, Self::MAX_LOCATIONS),
            simultaneous_categories: self.simultaneous_categories.clamp(1, Self::MAX_CATEGORIES),
            simultaneous_lookups: self.simultaneous_lookups.clamp(1, Self::MAX_LOOKUPS),
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            simultaneous_locations: 2,
            simultaneous_categories: 3,
            simultaneous_lookups: 5,
        }
    }
}

/// 运行进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// 已结束（成功或失败）的任务数
    pub completed_tasks: usize,
    /// 任务总数
    pub total_tasks: usize,
}

impl Progress {
    pub fn new(total_tasks: usize) -> Self {
        Self {
            completed_tasks: 0,
            total_tasks,
        }
    }

    /// 完成比例，取值范围 [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        (self.completed_tasks.min(self.total_tasks) as f64) / (self.total_tasks as f64)
    }

    /// 四舍五入后的整数百分比
    ///
    /// 只有 completed 与 stopped 可以报告 100，其余状态（含 failed）最多 99。
    pub fn percent(&self, status: SessionStatus) -> u8 {
        let percent = (self.fraction() * 100.0).round() as u8;
        match status {
            SessionStatus::Completed | SessionStatus::Stopped => percent,
            _ => percent.min(99),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed_tasks >= self.total_tasks
    }
}
