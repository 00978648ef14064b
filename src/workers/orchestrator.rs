// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::FutureExt;
use metrics::{counter, gauge, histogram};
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::settings::OrchestratorSettings;
use crate::domain::models::business::Business;
use crate::domain::models::log_entry::LogEntry;
use crate::domain::models::session::{ConcurrencyConfig, Progress, Session, SessionStatus};
use crate::domain::models::task::TaskId;
use crate::domain::repositories::session_repository::{
    RepositoryError, SessionRepository, StatusChange,
};
use crate::domain::services::log_aggregator::LogAggregator;
use crate::domain::services::provider_lookup_service::{LookupOutcome, ProviderLookupService};
use crate::domain::services::work_planner::WorkPlan;
use crate::engines::traits::{BusinessFetcher, ExportTrigger, FetchError, FetchRequest};
use crate::utils::errors::OrchestratorError;
use crate::utils::retry_policy::RetryPolicy;

/// 编排器运行参数
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 单次抓取的最长等待时间
    pub fetch_timeout: Duration,
    /// 任务级重试策略
    pub retry_policy: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(60),
            retry_policy: RetryPolicy::none(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &OrchestratorSettings) -> Self {
        Self {
            fetch_timeout: settings.fetch_timeout(),
            retry_policy: RetryPolicy::from_settings(settings),
        }
    }
}

/// stop 操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    pub status: SessionStatus,
    pub businesses_collected: usize,
}

enum Command {
    Pause(oneshot::Sender<Result<StatusChange, OrchestratorError>>),
    Resume(oneshot::Sender<Result<StatusChange, OrchestratorError>>),
    Stop(oneshot::Sender<Result<StopOutcome, OrchestratorError>>),
}

/// 抓取编排器
///
/// 负责启动一次运行：将会话置为 running，并为该会话派生一个单线程的控制循环。
/// 控制循环独占状态转换，按工作计划在两个并发上限内派发任务，
/// 处理 pause/resume/stop 命令，并在所有任务结束后进入终止状态。
#[derive(Clone)]
pub struct Orchestrator {
    repository: Arc<dyn SessionRepository>,
    fetcher: Arc<dyn BusinessFetcher>,
    logs: LogAggregator,
    lookup: Option<ProviderLookupService>,
    export: Option<Arc<dyn ExportTrigger>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        fetcher: Arc<dyn BusinessFetcher>,
        logs: LogAggregator,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            repository,
            fetcher,
            logs,
            lookup: None,
            export: None,
            config,
        }
    }

    /// 启用运营商解析阶段
    pub fn with_lookup(mut self, lookup: ProviderLookupService) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// 设置会话完成后的导出触发器
    pub fn with_export_trigger(mut self, export: Arc<dyn ExportTrigger>) -> Self {
        self.export = Some(export);
        self
    }

    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        &self.repository
    }

    pub fn logs(&self) -> &LogAggregator {
        &self.logs
    }

    /// 开始一次运行
    ///
    /// 并发配置在派发任何任务之前校验。会话必须处于 idle 状态。
    ///
    /// # 参数
    ///
    /// * `session` - 已创建的会话
    /// * `plan` - 本次运行的工作计划
    /// * `resolve_providers` - 所有任务结束后是否解析运营商
    pub async fn start(
        &self,
        session: &Session,
        plan: WorkPlan,
        resolve_providers: bool,
    ) -> Result<OrchestratorHandle, OrchestratorError> {
        session.concurrency.validate()?;

        let running = self
            .repository
            .begin_run(session.id, plan.total_tasks())
            .await?;

        counter!("scrape_sessions_started_total").increment(1);
        gauge!("scrape_sessions_active").increment(1.0);
        info!(
            session_id = %running.id,
            tasks = plan.total_tasks(),
            locations = plan.locations().len(),
            categories = plan.categories().len(),
            fetcher = self.fetcher.name(),
            "Scraping session started"
        );

        let (command_tx, command_rx) = mpsc::channel(16);
        let (finished_tx, finished_rx) = watch::channel(None);

        let run = SessionRun {
            session_id: running.id,
            concurrency: running.concurrency,
            resolve_providers: resolve_providers && self.lookup.is_some(),
            plan,
            ctx: Arc::new(TaskContext {
                session_id: running.id,
                repository: self.repository.clone(),
                fetcher: self.fetcher.clone(),
                logs: self.logs.clone(),
                fetch_timeout: self.config.fetch_timeout,
                retry_policy: self.config.retry_policy.clone(),
            }),
            lookup: self.lookup.clone(),
            export: self.export.clone(),
            commands: command_rx,
            finished: finished_tx,
            cancel: CancellationToken::new(),
            workers: JoinSet::new(),
            paused: false,
            phase: Phase::Scraping,
        };
        tokio::spawn(run.run());

        Ok(OrchestratorHandle {
            session_id: running.id,
            commands: command_tx,
            repository: self.repository.clone(),
            finished: finished_rx,
        })
    }
}

/// 单个会话控制循环的句柄
///
/// 控制循环结束后（会话已进入终止状态），控制操作退化为读取存储中的
/// 实际状态并返回 `InvalidSessionTransition`，由调用方视为空操作。
#[derive(Clone)]
pub struct OrchestratorHandle {
    session_id: Uuid,
    commands: mpsc::Sender<Command>,
    repository: Arc<dyn SessionRepository>,
    finished: watch::Receiver<Option<SessionStatus>>,
}

impl OrchestratorHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// 控制循环是否已经退出
    pub fn is_finished(&self) -> bool {
        self.finished.borrow().is_some()
    }

    /// 暂停派发新任务，已在执行的任务继续完成
    pub async fn pause(&self) -> Result<StatusChange, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        match self.request(Command::Pause(tx), rx).await {
            Some(result) => result,
            None => Err(self.inactive(SessionStatus::Paused).await),
        }
    }

    /// 恢复派发剩余任务
    pub async fn resume(&self) -> Result<StatusChange, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        match self.request(Command::Resume(tx), rx).await {
            Some(result) => result,
            None => Err(self.inactive(SessionStatus::Running).await),
        }
    }

    /// 停止会话，请求所有在途任务取消
    pub async fn stop(&self) -> Result<StopOutcome, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        match self.request(Command::Stop(tx), rx).await {
            Some(result) => result,
            None => Err(self.inactive(SessionStatus::Stopped).await),
        }
    }

    /// 等待控制循环结束，返回会话的终止状态
    pub async fn wait(&self) -> Result<SessionStatus, OrchestratorError> {
        let mut finished = self.finished.clone();
        let status = finished
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|status| *status);

        match status {
            Some(status) => Ok(status),
            None => self
                .repository
                .find_by_id(self.session_id)
                .await?
                .map(|session| session.status)
                .ok_or(OrchestratorError::SessionNotFound(self.session_id)),
        }
    }

    async fn request<T>(&self, command: Command, reply: oneshot::Receiver<T>) -> Option<T> {
        if self.commands.send(command).await.is_err() {
            return None;
        }
        reply.await.ok()
    }

    async fn inactive(&self, requested: SessionStatus) -> OrchestratorError {
        match self.repository.find_by_id(self.session_id).await {
            Ok(Some(session)) => OrchestratorError::InvalidSessionTransition {
                from: session.status,
                to: requested,
            },
            Ok(None) => OrchestratorError::SessionNotFound(self.session_id),
            Err(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Scraping,
    Resolving,
    Ready,
}

enum WorkerEvent {
    Task(TaskReport),
    Lookup(Result<LookupOutcome, OrchestratorError>),
}

/// 一次运行的控制循环状态
struct SessionRun {
    session_id: Uuid,
    concurrency: ConcurrencyConfig,
    resolve_providers: bool,
    plan: WorkPlan,
    ctx: Arc<TaskContext>,
    lookup: Option<ProviderLookupService>,
    export: Option<Arc<dyn ExportTrigger>>,
    commands: mpsc::Receiver<Command>,
    finished: watch::Sender<Option<SessionStatus>>,
    cancel: CancellationToken,
    workers: JoinSet<WorkerEvent>,
    paused: bool,
    phase: Phase,
}

impl SessionRun {
    async fn run(mut self) {
        let status = match self.drive().await {
            Ok(status) => status,
            Err(fault) => self.fail(fault).await,
        };

        self.cancel.cancel();
        self.drain().await;

        gauge!("scrape_sessions_active").decrement(1.0);
        counter!("scrape_sessions_finished_total", "status" => status.to_string()).increment(1);
        info!(session_id = %self.session_id, %status, "Scraping session finished");

        self.finished.send_replace(Some(status));
    }

    async fn drive(&mut self) -> Result<SessionStatus, OrchestratorError> {
        self.log(LogEntry::info(format!(
            "Scraping {} locations x {} categories ({} tasks) with {} fetcher",
            self.plan.locations().len(),
            self.plan.categories().len(),
            self.plan.total_tasks(),
            self.ctx.fetcher.name()
        )))
        .await?;

        let mut commands_open = true;

        loop {
            if !self.paused {
                self.dispatch();
            }

            if self.phase == Phase::Scraping && self.plan.is_exhausted() {
                self.phase = if self.resolve_providers && self.spawn_lookup().await? {
                    Phase::Resolving
                } else {
                    Phase::Ready
                };
            }

            if self.phase == Phase::Ready && !self.paused {
                return self.complete().await;
            }

            tokio::select! {
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => {
                        if let Some(status) = self.handle_command(command).await? {
                            return Ok(status);
                        }
                    }
                    None => commands_open = false,
                },
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    match joined {
                        Ok(WorkerEvent::Task(report)) => self.on_task_finished(report).await?,
                        Ok(WorkerEvent::Lookup(result)) => self.on_lookup_finished(result).await?,
                        Err(e) => {
                            return Err(OrchestratorError::OrchestrationFault(format!(
                                "worker terminated unexpectedly: {}",
                                e
                            )));
                        }
                    }
                },
                else => {
                    // Paused with nobody left to resume it
                    warn!(session_id = %self.session_id, "All controllers dropped while paused, stopping");
                    return self.stop().await.map(|outcome| outcome.status);
                }
            }
        }
    }

    /// 在两个并发上限允许的范围内尽可能多地派发任务
    fn dispatch(&mut self) {
        if self.phase != Phase::Scraping || self.cancel.is_cancelled() {
            return;
        }

        while let Some(task_id) = self.plan.next_dispatchable() {
            let Some(task) = self.plan.task_mut(task_id) else {
                continue;
            };
            if let Err(e) = task.start() {
                warn!(task_id, "Task dispatched twice: {}", e);
            }

            let job = TaskJob {
                task_id,
                location: task.location.clone(),
                category: task.category.clone(),
            };
            let ctx = self.ctx.clone();
            let cancel = self.cancel.child_token();

            debug!(
                session_id = %self.session_id,
                task_id,
                location = %job.location,
                category = %job.category,
                "Dispatching task"
            );

            self.workers.spawn(async move {
                let report = AssertUnwindSafe(run_task(ctx, job.clone(), cancel))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| TaskReport::panicked(&job));
                WorkerEvent::Task(report)
            });
        }
    }

    async fn handle_command(
        &mut self,
        command: Command,
    ) -> Result<Option<SessionStatus>, OrchestratorError> {
        match command {
            Command::Pause(reply) => {
                let result = self.set_status(SessionStatus::Paused).await;
                if let Ok(change) = &result {
                    self.paused = true;
                    if change.changed() {
                        self.log(LogEntry::info("Session paused")).await?;
                    }
                }
                let fault = result.as_ref().err().filter(|e| !e.is_noop_transition()).cloned();
                let _ = reply.send(result);
                if let Some(fault) = fault {
                    return Err(fault);
                }
            }
            Command::Resume(reply) => {
                let result = self.set_status(SessionStatus::Running).await;
                if let Ok(change) = &result {
                    self.paused = false;
                    if change.changed() {
                        self.log(LogEntry::info("Session resumed")).await?;
                    }
                }
                let fault = result.as_ref().err().filter(|e| !e.is_noop_transition()).cloned();
                let _ = reply.send(result);
                if let Some(fault) = fault {
                    return Err(fault);
                }
            }
            Command::Stop(reply) => {
                let result = self.stop().await;
                let stopped = result.as_ref().map(|outcome| outcome.status).ok();
                let fault = result.as_ref().err().cloned();
                let _ = reply.send(result);
                if let Some(fault) = fault {
                    return Err(fault);
                }
                return Ok(stopped);
            }
        }
        Ok(None)
    }

    async fn stop(&mut self) -> Result<StopOutcome, OrchestratorError> {
        self.cancel.cancel();
        self.set_status(SessionStatus::Stopped).await?;

        let businesses_collected = self
            .ctx
            .repository
            .find_by_id(self.session_id)
            .await?
            .map_or(0, |session| session.businesses.len());

        self.log(LogEntry::info(format!(
            "Session stopped. {} businesses collected",
            businesses_collected
        )))
        .await?;

        Ok(StopOutcome {
            status: SessionStatus::Stopped,
            businesses_collected,
        })
    }

    async fn on_task_finished(&mut self, report: TaskReport) -> Result<(), OrchestratorError> {
        self.plan.complete(report.task_id);
        histogram!("scrape_task_duration_seconds").record(report.elapsed.as_secs_f64());

        let Some(task) = self.plan.task_mut(report.task_id) else {
            return Ok(());
        };

        let transition = match report.outcome {
            TaskOutcome::Succeeded(businesses) => {
                counter!("scrape_tasks_completed_total").increment(1);
                task.succeed(businesses, report.attempts)
            }
            TaskOutcome::Failed(reason) => {
                counter!("scrape_tasks_failed_total").increment(1);
                task.fail(reason, report.attempts)
            }
            TaskOutcome::Panicked => {
                counter!("scrape_tasks_failed_total").increment(1);
                let message = format!(
                    "Task for {} in {} crashed",
                    task.category, task.location
                );
                let transition = task.fail(message.clone(), report.attempts);
                self.log(LogEntry::error(message)).await?;
                self.ctx.repository.mark_task_finished(self.session_id).await?;
                transition
            }
            TaskOutcome::Abandoned => Ok(()),
            TaskOutcome::Fault(message) => {
                return Err(OrchestratorError::OrchestrationFault(message));
            }
        };

        if let Err(e) = transition {
            warn!(task_id = report.task_id, "Unexpected task state: {}", e);
        }

        if let Some(progress) = report.progress {
            debug!(
                session_id = %self.session_id,
                completed = progress.completed_tasks,
                total = progress.total_tasks,
                "Progress updated"
            );
        }

        Ok(())
    }

    /// 启动运营商解析阶段，未配置查询服务时返回 false
    async fn spawn_lookup(&mut self) -> Result<bool, OrchestratorError> {
        let Some(lookup) = self.lookup.as_ref() else {
            warn!(session_id = %self.session_id, "Provider lookup requested but not configured");
            return Ok(false);
        };

        let session = self
            .ctx
            .repository
            .find_by_id(self.session_id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(self.session_id))?;

        let phones: BTreeSet<String> = session
            .businesses
            .iter()
            .filter_map(|b| b.phone.clone())
            .filter(|p| !p.trim().is_empty())
            .collect();

        self.log(LogEntry::info(format!(
            "Resolving providers for {} phone numbers",
            phones.len()
        )))
        .await?;

        let lookup = lookup.with_max_concurrent_batches(self.concurrency.simultaneous_lookups);
        let cancel = self.cancel.child_token();
        self.workers.spawn(async move {
            WorkerEvent::Lookup(lookup.resolve_until(phones, &cancel).await)
        });

        Ok(true)
    }

    async fn on_lookup_finished(
        &mut self,
        result: Result<LookupOutcome, OrchestratorError>,
    ) -> Result<(), OrchestratorError> {
        self.phase = Phase::Ready;

        match result {
            Ok(outcome) => {
                self.ctx
                    .repository
                    .record_providers(self.session_id, outcome.providers)
                    .await?;
                self.ctx.logs.append(self.session_id, outcome.logs).await?;
            }
            Err(e) => {
                // Provider resolution is best effort
                warn!(session_id = %self.session_id, "Provider lookup failed: {}", e);
                self.log(LogEntry::error(format!("Provider lookup failed: {}", e)))
                    .await?;
            }
        }

        Ok(())
    }

    async fn complete(&mut self) -> Result<SessionStatus, OrchestratorError> {
        let collected = self
            .ctx
            .repository
            .find_by_id(self.session_id)
            .await?
            .map_or(0, |session| session.businesses.len());

        self.log(LogEntry::info(format!(
            "Scraping completed. {} businesses collected",
            collected
        )))
        .await?;
        self.set_status(SessionStatus::Completed).await?;

        if let Some(export) = &self.export {
            if let Err(e) = export.trigger(self.session_id).await {
                error!(session_id = %self.session_id, "Export trigger failed: {}", e);
                let _ = self
                    .ctx
                    .logs
                    .push(self.session_id, LogEntry::error(format!("Export failed: {}", e)))
                    .await;
            }
        }

        Ok(SessionStatus::Completed)
    }

    async fn fail(&mut self, fault: OrchestratorError) -> SessionStatus {
        self.cancel.cancel();
        let message = fault.to_string();
        error!(session_id = %self.session_id, "Session failed: {}", message);

        let _ = self
            .ctx
            .logs
            .push(self.session_id, LogEntry::error(message.clone()))
            .await;

        if let Err(e) = self
            .ctx
            .repository
            .update_status(self.session_id, SessionStatus::Failed, Some(message))
            .await
        {
            error!(session_id = %self.session_id, "Failed to record session failure: {}", e);
        }

        SessionStatus::Failed
    }

    /// 等待所有在途工作观察到取消信号后退出
    async fn drain(&mut self) {
        while let Some(joined) = self.workers.join_next().await {
            if let Ok(WorkerEvent::Task(report)) = joined {
                self.plan.complete(report.task_id);
            }
        }
    }

    async fn set_status(&self, status: SessionStatus) -> Result<StatusChange, OrchestratorError> {
        self.ctx
            .repository
            .update_status(self.session_id, status, None)
            .await
            .map_err(OrchestratorError::from)
    }

    async fn log(&self, entry: LogEntry) -> Result<(), OrchestratorError> {
        self.ctx
            .logs
            .push(self.session_id, entry)
            .await
            .map_err(OrchestratorError::from)
    }
}

/// 任务执行所需的共享上下文
struct TaskContext {
    session_id: Uuid,
    repository: Arc<dyn SessionRepository>,
    fetcher: Arc<dyn BusinessFetcher>,
    logs: LogAggregator,
    fetch_timeout: Duration,
    retry_policy: RetryPolicy,
}

#[derive(Debug, Clone)]
struct TaskJob {
    task_id: TaskId,
    location: String,
    category: String,
}

enum TaskOutcome {
    Succeeded(Vec<Business>),
    Failed(String),
    /// 会话已停止，结果被丢弃
    Abandoned,
    /// 任务崩溃，由控制循环补记
    Panicked,
    /// 会话存储故障
    Fault(String),
}

struct TaskReport {
    task_id: TaskId,
    attempts: u32,
    elapsed: Duration,
    outcome: TaskOutcome,
    progress: Option<Progress>,
}

impl TaskReport {
    fn panicked(job: &TaskJob) -> Self {
        Self {
            task_id: job.task_id,
            attempts: 1,
            elapsed: Duration::ZERO,
            outcome: TaskOutcome::Panicked,
            progress: None,
        }
    }
}

#[instrument(
    name = "scrape_task",
    skip_all,
    fields(
        session_id = %ctx.session_id,
        fetcher = ctx.fetcher.name(),
        location = %job.location,
        category = %job.category
    )
)]
async fn run_task(ctx: Arc<TaskContext>, job: TaskJob, cancel: CancellationToken) -> TaskReport {
    let started = Instant::now();
    let mut attempts = 0;

    let (outcome, progress) = match execute_task(&ctx, &job, &cancel, &mut attempts).await {
        Ok(result) => result,
        Err(e) => {
            error!("Session store failed during task: {}", e);
            (TaskOutcome::Fault(e.to_string()), None)
        }
    };

    TaskReport {
        task_id: job.task_id,
        attempts,
        elapsed: started.elapsed(),
        outcome,
        progress,
    }
}

async fn execute_task(
    ctx: &TaskContext,
    job: &TaskJob,
    cancel: &CancellationToken,
    attempts: &mut u32,
) -> Result<(TaskOutcome, Option<Progress>), RepositoryError> {
    let fetched = loop {
        if cancel.is_cancelled() {
            return Ok((TaskOutcome::Abandoned, None));
        }
        *attempts += 1;

        let request = FetchRequest {
            location: job.location.clone(),
            category: job.category.clone(),
            timeout: ctx.fetch_timeout,
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return Ok((TaskOutcome::Abandoned, None)),
            result = tokio::time::timeout(ctx.fetch_timeout, ctx.fetcher.fetch(&request)) => {
                result.unwrap_or(Err(FetchError::Timeout))
            }
        };

        match result {
            Ok(businesses) => break Ok(businesses),
            Err(e) if ctx.retry_policy.should_retry_fetch(*attempts - 1, &e) => {
                let backoff = ctx.retry_policy.calculate_backoff(*attempts);
                warn!(attempt = *attempts, "Fetch failed, retrying in {:?}: {}", backoff, e);
                ctx.logs
                    .push(
                        ctx.session_id,
                        LogEntry::info(format!(
                            "Retrying {} in {} after error: {}",
                            job.category, job.location, e
                        )),
                    )
                    .await?;

                tokio::select! {
                    _ = cancel.cancelled() => return Ok((TaskOutcome::Abandoned, None)),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
            Err(e) => break Err(e),
        }
    };

    // Results arriving after a stop are discarded
    if cancel.is_cancelled() {
        return Ok((TaskOutcome::Abandoned, None));
    }

    let outcome = match fetched {
        Ok(businesses) => {
            let count = businesses.len();
            let appended = ctx
                .repository
                .append_businesses(ctx.session_id, businesses.clone())
                .await?;
            if appended.is_none() {
                // Stopped between the check above and the append
                return Ok((TaskOutcome::Abandoned, None));
            }
            ctx.logs
                .push(
                    ctx.session_id,
                    LogEntry::success(format!(
                        "Found {} businesses for {} in {}",
                        count, job.category, job.location
                    )),
                )
                .await?;
            TaskOutcome::Succeeded(businesses)
        }
        Err(e) => {
            let err = OrchestratorError::TaskFetchError(e.to_string());
            ctx.logs
                .push(
                    ctx.session_id,
                    LogEntry::error(format!(
                        "Failed to fetch {} in {}: {}",
                        job.category, job.location, e
                    )),
                )
                .await?;
            TaskOutcome::Failed(err.to_string())
        }
    };

    let progress = ctx.repository.mark_task_finished(ctx.session_id).await?;
    Ok((outcome, Some(progress)))
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
