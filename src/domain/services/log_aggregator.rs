// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::models::log_entry::{LogEntry, LogLevel};
use crate::domain::models::session::Session;
use crate::domain::repositories::session_repository::{RepositoryError, SessionRepository};

/// 会话日志聚合器
///
/// 写入时原样落到会话存储（存储侧不截断），同时镜像到 tracing；
/// 读取时只返回最近的 `retention` 条。
#[derive(Clone)]
pub struct LogAggregator {
    repository: Arc<dyn SessionRepository>,
    retention: usize,
}

impl LogAggregator {
    pub fn new(repository: Arc<dyn SessionRepository>, retention: usize) -> Self {
        Self {
            repository,
            retention: retention.max(1),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// 追加一条日志
    pub async fn push(&self, session_id: Uuid, entry: LogEntry) -> Result<(), RepositoryError> {
        self.append(session_id, vec![entry]).await
    }

    /// 按顺序追加一组日志
    pub async fn append(
        &self,
        session_id: Uuid,
        entries: Vec<LogEntry>,
    ) -> Result<(), RepositoryError> {
        if entries.is_empty() {
            return Ok(());
        }

        for entry in &entries {
            match entry.level {
                LogLevel::Error => error!(%session_id, "{}", entry.message),
                LogLevel::Info | LogLevel::Success => {
                    info!(%session_id, level = %entry.level, "{}", entry.message)
                }
            }
        }

        self.repository.append_logs(session_id, entries).await
    }

    /// 最近的日志条目，按追加顺序排列
    pub fn recent<'a>(&self, session: &'a Session) -> &'a [LogEntry] {
        let start = session.logs.len().saturating_sub(self.retention);
        &session.logs[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::session::ConcurrencyConfig;
    use crate::infrastructure::repositories::in_memory_session_repo::InMemorySessionRepository;

    #[tokio::test]
    async fn test_store_keeps_everything_and_reads_are_capped() {
        let repo = Arc::new(InMemorySessionRepository::new());
        let session = repo.create(&Session::new(ConcurrencyConfig::default())).await.unwrap();
        let aggregator = LogAggregator::new(repo.clone(), 3);

        for i in 0..5 {
            aggregator
                .push(session.id, LogEntry::info(format!("entry {}", i)))
                .await
                .unwrap();
        }

        let stored = repo.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(stored.logs.len(), 5);

        let recent = aggregator.recent(&stored);
        let messages: Vec<&str> = recent.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[tokio::test]
    async fn test_append_to_missing_session_fails() {
        let repo = Arc::new(InMemorySessionRepository::new());
        let aggregator = LogAggregator::new(repo, 10);

        let err = aggregator
            .push(Uuid::new_v4(), LogEntry::error("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
