// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::repositories::session_repository::{RepositoryError, SessionRepository};
use crate::workers::orchestrator::OrchestratorHandle;

/// 活动会话注册表
///
/// 保存每个已启动会话的控制句柄，控制面通过会话 ID 查找句柄。
#[derive(Clone, Default)]
pub struct SessionRegistry {
    handles: Arc<DashMap<Uuid, OrchestratorHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: OrchestratorHandle) {
        self.handles.insert(handle.session_id(), handle);
    }

    pub fn get(&self, id: Uuid) -> Option<OrchestratorHandle> {
        self.handles.get(&id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: Uuid) -> Option<OrchestratorHandle> {
        self.handles.remove(&id).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 控制循环已退出的会话 ID
    fn finished(&self) -> Vec<Uuid> {
        self.handles
            .iter()
            .filter(|entry| entry.value().is_finished())
            .map(|entry| *entry.key())
            .collect()
    }
}

/// 终止会话清理工作器
///
/// 定期扫描注册表，将进入终止状态超过保留期的会话从注册表和存储中移除。
pub struct SessionSweeper {
    registry: SessionRegistry,
    repository: Arc<dyn SessionRepository>,
    grace_period: Duration,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(
        registry: SessionRegistry,
        repository: Arc<dyn SessionRepository>,
        grace_period: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            repository,
            grace_period,
            interval,
        }
    }

    /// 运行工作器
    pub async fn run(&self) {
        info!(
            grace_period_secs = self.grace_period.as_secs(),
            "Session sweeper started"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;

            match self.sweep(Utc::now()).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Evicted {} finished sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to sweep finished sessions: {}", e);
                }
            }
        }
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// 清理在 `now` 时刻已超过保留期的终止会话，返回清理数量
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let grace = chrono::Duration::from_std(self.grace_period).unwrap_or(chrono::Duration::MAX);
        let mut evicted = 0;

        for id in self.registry.finished() {
            let expired = match self.repository.find_by_id(id).await? {
                Some(session) => session
                    .completed_at
                    .and_then(|completed_at| completed_at.checked_add_signed(grace))
                    .is_some_and(|expires_at| expires_at <= now),
                // Store already lost it
                None => true,
            };

            if !expired {
                continue;
            }

            self.registry.remove(id);
            self.repository.delete(id).await?;
            debug!(session_id = %id, "Session evicted");
            evicted += 1;
        }

        Ok(evicted)
    }
}

#[cfg(test)]
#[path = "session_registry_test.rs"]
mod tests;
