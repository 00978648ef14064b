// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::models::business::Business;
use crate::domain::models::log_entry::LogEntry;
use crate::domain::models::session::{Session, SessionStatus};

/// 启动会话响应
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponseDto {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub total_tasks: usize,
}

/// pause/resume/stop 的响应
///
/// `status` 为控制动作的结果（`paused`、`resumed`、`stopped`），
/// 对已终止的会话则为其实际状态。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponseDto {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub businesses_collected: Option<usize>,
}

impl ControlResponseDto {
    pub fn status(status: impl ToString) -> Self {
        Self {
            status: status.to_string(),
            businesses_collected: None,
        }
    }

    pub fn stopped(status: SessionStatus, businesses_collected: usize) -> Self {
        Self {
            status: status.to_string(),
            businesses_collected: Some(businesses_collected),
        }
    }
}

/// 会话状态快照
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponseDto {
    pub session_id: Uuid,
    pub status: SessionStatus,
    /// 四舍五入的整数百分比
    pub progress: u8,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub businesses: Vec<Business>,
    /// 最近的日志条目
    pub logs: Vec<LogEntry>,
    pub providers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SessionStatusResponseDto {
    pub fn from_session(session: Session, logs: Vec<LogEntry>) -> Self {
        Self {
            session_id: session.id,
            status: session.status,
            progress: session.progress.percent(session.status),
            total_tasks: session.progress.total_tasks,
            completed_tasks: session.progress.completed_tasks,
            businesses: session.businesses,
            logs,
            providers: session.providers,
            started_at: session.started_at,
            completed_at: session.completed_at,
            error_message: session.error_message,
        }
    }
}

/// 单个号码运营商查询响应
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponseDto {
    /// 规范化后的号码
    pub phone_number: String,
    /// 运营商名称，未解析时为 `Unknown`
    pub provider: String,
}
