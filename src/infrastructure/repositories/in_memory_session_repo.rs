// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::business::Business;
use crate::domain::models::log_entry::LogEntry;
use crate::domain::models::session::{Progress, Session, SessionStatus};
use crate::domain::repositories::session_repository::{
    RepositoryError, SessionRepository, StatusChange,
};

/// 会话仓库实现
///
/// 基于 DashMap 的进程内会话存储。每次变更都在对应分片的写锁内完成，
/// 因此并发任务的追加会被线性化。
#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    /// 会话表
    sessions: Arc<DashMap<Uuid, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的会话数
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        let result = f(entry.value_mut())?;
        entry.updated_at = Utc::now();
        Ok(result)
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: &Session) -> Result<Session, RepositoryError> {
        self.sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.get(&id).map(|entry| entry.value().clone()))
    }

    async fn begin_run(&self, id: Uuid, total_tasks: usize) -> Result<Session, RepositoryError> {
        self.with_session(id, |session| {
            if session.status != SessionStatus::Idle {
                return Err(RepositoryError::InvalidTransition {
                    from: session.status,
                    to: SessionStatus::Running,
                });
            }

            session.businesses.clear();
            session.logs.clear();
            session.providers.clear();
            session.progress = Progress::new(total_tasks);
            session
                .transition(SessionStatus::Running, None)
                .map_err(|_| RepositoryError::InvalidTransition {
                    from: SessionStatus::Idle,
                    to: SessionStatus::Running,
                })?;
            Ok(session.clone())
        })
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SessionStatus,
        error_message: Option<String>,
    ) -> Result<StatusChange, RepositoryError> {
        self.with_session(id, |session| {
            let previous = session.status;
            session
                .transition(status, error_message)
                .map_err(|_| RepositoryError::InvalidTransition {
                    from: previous,
                    to: status,
                })?;
            Ok(StatusChange {
                previous,
                current: session.status,
            })
        })
    }

    async fn append_businesses(
        &self,
        id: Uuid,
        businesses: Vec<Business>,
    ) -> Result<Option<usize>, RepositoryError> {
        self.with_session(id, |session| {
            if session.status.is_terminal() {
                return Ok(None);
            }
            session.businesses.extend(businesses);
            Ok(Some(session.businesses.len()))
        })
    }

    async fn append_logs(&self, id: Uuid, entries: Vec<LogEntry>) -> Result<(), RepositoryError> {
        self.with_session(id, |session| {
            session.logs.extend(entries);
            Ok(())
        })
    }

    async fn mark_task_finished(&self, id: Uuid) -> Result<Progress, RepositoryError> {
        self.with_session(id, |session| {
            if session.progress.completed_tasks < session.progress.total_tasks {
                session.progress.completed_tasks += 1;
            }
            Ok(session.progress)
        })
    }

    async fn record_providers(
        &self,
        id: Uuid,
        providers: BTreeMap<String, String>,
    ) -> Result<(), RepositoryError> {
        self.with_session(id, |session| {
            session.providers.extend(providers);
            Ok(())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.sessions.remove(&id).is_some())
    }
}
