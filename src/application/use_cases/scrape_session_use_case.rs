// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::session_request::{LookupRequestDto, StartSessionRequestDto};
use crate::application::dto::session_response::{
    ControlResponseDto, LookupResponseDto, SessionStatusResponseDto, StartSessionResponseDto,
};
use crate::config::settings::ConcurrencySettings;
use crate::domain::models::session::{Session, SessionStatus};
use crate::domain::repositories::session_repository::RepositoryError;
use crate::domain::services::provider_lookup_service::ProviderLookupService;
use crate::domain::services::work_planner::{normalize_targets, WorkPlanner};
use crate::utils::errors::OrchestratorError;
use crate::workers::orchestrator::{Orchestrator, OrchestratorHandle};
use crate::workers::session_registry::SessionRegistry;

#[derive(Error, Debug)]
pub enum SessionUseCaseError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

impl From<RepositoryError> for SessionUseCaseError {
    fn from(err: RepositoryError) -> Self {
        SessionUseCaseError::Orchestrator(err.into())
    }
}

/// 会话控制面与号码查询面
///
/// 启动会话并登记到注册表；pause/resume/stop 经由注册表中的句柄送达控制循环；
/// 状态读取直接来自会话存储。
#[derive(Clone)]
pub struct ScrapeSessionUseCase {
    orchestrator: Orchestrator,
    registry: SessionRegistry,
    lookup: ProviderLookupService,
    concurrency: ConcurrencySettings,
}

impl ScrapeSessionUseCase {
    pub fn new(
        orchestrator: Orchestrator,
        registry: SessionRegistry,
        lookup: ProviderLookupService,
        concurrency: ConcurrencySettings,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            lookup,
            concurrency,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// 创建会话并开始运行
    pub async fn start(
        &self,
        request: StartSessionRequestDto,
    ) -> Result<StartSessionResponseDto, SessionUseCaseError> {
        request
            .validate()
            .map_err(|e| SessionUseCaseError::ValidationError(e.to_string()))?;

        let locations = normalize_targets(&request.locations);
        let categories = normalize_targets(&request.categories);
        if locations.is_empty() {
            return Err(SessionUseCaseError::ValidationError(
                "at least one non-empty location is required".to_string(),
            ));
        }
        if categories.is_empty() {
            return Err(SessionUseCaseError::ValidationError(
                "at least one non-empty category is required".to_string(),
            ));
        }

        let defaults = self.concurrency.defaults();
        let mut concurrency = request
            .concurrency
            .map_or(defaults, |dto| dto.merge_into(defaults));
        if self.concurrency.clamp_out_of_range {
            concurrency = concurrency.clamped();
        }
        concurrency.validate()?;

        let session = self
            .orchestrator
            .repository()
            .create(&Session::new(concurrency))
            .await?;
        let plan = WorkPlanner::new(&concurrency).plan(&locations, &categories);
        let total_tasks = plan.total_tasks();

        let handle = self
            .orchestrator
            .start(&session, plan, request.resolve_providers)
            .await?;
        self.registry.register(handle);

        Ok(StartSessionResponseDto {
            session_id: session.id,
            status: SessionStatus::Running,
            total_tasks,
        })
    }

    pub async fn pause(&self, id: Uuid) -> Result<ControlResponseDto, SessionUseCaseError> {
        let handle = self.handle(id)?;
        match handle.pause().await {
            Ok(_) => {
                info!(session_id = %id, "Pause requested");
                Ok(ControlResponseDto::status(SessionStatus::Paused))
            }
            Err(e) => self.settled(id, e).await,
        }
    }

    pub async fn resume(&self, id: Uuid) -> Result<ControlResponseDto, SessionUseCaseError> {
        let handle = self.handle(id)?;
        match handle.resume().await {
            Ok(_) => {
                info!(session_id = %id, "Resume requested");
                Ok(ControlResponseDto::status("resumed"))
            }
            Err(e) => self.settled(id, e).await,
        }
    }

    pub async fn stop(&self, id: Uuid) -> Result<ControlResponseDto, SessionUseCaseError> {
        let handle = self.handle(id)?;
        match handle.stop().await {
            Ok(outcome) => {
                info!(session_id = %id, collected = outcome.businesses_collected, "Stop requested");
                Ok(ControlResponseDto::stopped(
                    outcome.status,
                    outcome.businesses_collected,
                ))
            }
            Err(e) => self.settled(id, e).await,
        }
    }

    /// 读取会话状态快照
    pub async fn status(&self, id: Uuid) -> Result<SessionStatusResponseDto, SessionUseCaseError> {
        let session = self
            .orchestrator
            .repository()
            .find_by_id(id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(id))?;

        let logs = self.orchestrator.logs().recent(&session).to_vec();
        Ok(SessionStatusResponseDto::from_session(session, logs))
    }

    /// 查询单个号码的运营商
    pub async fn lookup(
        &self,
        request: LookupRequestDto,
    ) -> Result<LookupResponseDto, SessionUseCaseError> {
        request
            .validate()
            .map_err(|e| SessionUseCaseError::ValidationError(e.to_string()))?;

        let (phone_number, provider) = self.lookup.lookup(&request.phone_number).await?;
        Ok(LookupResponseDto {
            phone_number,
            provider,
        })
    }

    fn handle(&self, id: Uuid) -> Result<OrchestratorHandle, SessionUseCaseError> {
        self.registry
            .get(id)
            .ok_or(SessionUseCaseError::Orchestrator(
                OrchestratorError::SessionNotFound(id),
            ))
    }

    /// 终止状态下的控制请求视为空操作，报告会话的实际状态
    async fn settled(
        &self,
        id: Uuid,
        err: OrchestratorError,
    ) -> Result<ControlResponseDto, SessionUseCaseError> {
        let OrchestratorError::InvalidSessionTransition { from, .. } = err else {
            return Err(err.into());
        };

        if from != SessionStatus::Stopped {
            return Ok(ControlResponseDto::status(from));
        }

        let collected = self
            .orchestrator
            .repository()
            .find_by_id(id)
            .await?
            .map_or(0, |session| session.businesses.len());
        Ok(ControlResponseDto::stopped(from, collected))
    }
}

#[cfg(test)]
#[path = "scrape_session_use_case_test.rs"]
mod tests;
