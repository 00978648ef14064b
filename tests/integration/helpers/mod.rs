// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use axum_test::TestServer;
use leadrs::application::use_cases::scrape_session_use_case::ScrapeSessionUseCase;
use leadrs::config::settings::ConcurrencySettings;
use leadrs::domain::models::business::Business;
use leadrs::domain::models::session::{ConcurrencyConfig, Session, SessionStatus};
use leadrs::domain::repositories::session_repository::SessionRepository;
use leadrs::domain::services::log_aggregator::LogAggregator;
use leadrs::domain::services::phone_normalizer::PhoneNormalizer;
use leadrs::domain::services::provider_lookup_service::{LookupConfig, ProviderLookupService};
use leadrs::domain::services::work_planner::WorkPlanner;
use leadrs::engines::traits::{
    BusinessFetcher, FetchError, FetchRequest, ProviderResolver, ResolverError, ResolverSession,
};
use leadrs::infrastructure::repositories::in_memory_session_repo::InMemorySessionRepository;
use leadrs::presentation::routes;
use leadrs::workers::orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorHandle};
use leadrs::workers::session_registry::SessionRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// 并发观测数据
#[derive(Default)]
struct InFlight {
    per_location: HashMap<String, usize>,
    max_locations: usize,
    max_categories: usize,
}

/// 可编排的抓取器
///
/// 每个 地点/类别 组合返回一条商户记录，`failing` 中的组合返回错误；
/// 同时记录两个维度上观测到的最大并发数。
#[derive(Default)]
pub struct ScriptedFetcher {
    pub failing: HashSet<(String, String)>,
    pub delay: Duration,
    pub gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    calls_by_pair: Mutex<HashMap<(String, String), usize>>,
    in_flight: Mutex<InFlight>,
}

impl ScriptedFetcher {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing(location: &str, category: &str) -> Self {
        Self {
            failing: HashSet::from([(location.to_string(), category.to_string())]),
            ..Default::default()
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, location: &str, category: &str) -> usize {
        self.calls_by_pair
            .lock()
            .unwrap()
            .get(&(location.to_string(), category.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// 同时有抓取在途的地点数的最大值
    pub fn max_concurrent_locations(&self) -> usize {
        self.in_flight.lock().unwrap().max_locations
    }

    /// 单个地点内同时在途的抓取数的最大值
    pub fn max_concurrent_categories(&self) -> usize {
        self.in_flight.lock().unwrap().max_categories
    }

    fn enter(&self, location: &str) {
        let mut state = self.in_flight.lock().unwrap();
        let count = state.per_location.entry(location.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        let active = state.per_location.values().filter(|n| **n > 0).count();
        state.max_categories = state.max_categories.max(count);
        state.max_locations = state.max_locations.max(active);
    }

    fn leave(&self, location: &str) {
        let mut state = self.in_flight.lock().unwrap();
        if let Some(count) = state.per_location.get_mut(location) {
            *count = count.saturating_sub(1);
        }
    }
}

#[async_trait]
impl BusinessFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Business>, FetchError> {
        let pair = (request.location.clone(), request.category.clone());
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.calls_by_pair.lock().unwrap().entry(pair.clone()).or_insert(0) += 1;

        self.enter(&request.location);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.leave(&request.location);

        if self.failing.contains(&pair) {
            return Err(FetchError::InvalidResponse("upstream returned garbage".into()));
        }

        Ok(vec![Business::new(
            format!("{} of {}", request.category, request.location),
            request.category.clone(),
            request.location.clone(),
        )
        .with_phone("+27 68 612 8512")])
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// 对所有号码返回同一运营商的解析服务
pub struct StaticResolver {
    pub provider: Option<&'static str>,
}

struct StaticResolverSession {
    provider: &'static str,
}

#[async_trait]
impl ProviderResolver for StaticResolver {
    async fn acquire(&self) -> Result<Box<dyn ResolverSession>, ResolverError> {
        match self.provider {
            Some(provider) => Ok(Box::new(StaticResolverSession { provider })),
            None => Err(ResolverError::Unreachable("connection refused".into())),
        }
    }
}

#[async_trait]
impl ResolverSession for StaticResolverSession {
    async fn resolve_batch(
        &self,
        numbers: &[String],
    ) -> Result<HashMap<String, String>, ResolverError> {
        Ok(numbers
            .iter()
            .map(|n| (n.clone(), self.provider.to_string()))
            .collect())
    }

    async fn cleanup(self: Box<Self>) {}
}

pub fn lookup_service(provider: Option<&'static str>) -> ProviderLookupService {
    ProviderLookupService::new(
        Arc::new(StaticResolver { provider }),
        PhoneNormalizer::default(),
        LookupConfig::default(),
    )
}

pub fn orchestrator(
    repo: &Arc<InMemorySessionRepository>,
    fetcher: Arc<ScriptedFetcher>,
) -> Orchestrator {
    Orchestrator::new(
        repo.clone(),
        fetcher,
        LogAggregator::new(repo.clone(), 500),
        OrchestratorConfig::default(),
    )
}

/// 直接通过编排器启动一次运行
pub async fn start_run(
    orchestrator: &Orchestrator,
    repo: &InMemorySessionRepository,
    locations: &[&str],
    categories: &[&str],
    concurrency: ConcurrencyConfig,
) -> OrchestratorHandle {
    let session = repo.create(&Session::new(concurrency)).await.unwrap();
    let plan = WorkPlanner::new(&concurrency).plan(locations.iter(), categories.iter());
    orchestrator.start(&session, plan, false).await.unwrap()
}

pub async fn snapshot(repo: &InMemorySessionRepository, id: Uuid) -> Session {
    repo.find_by_id(id).await.unwrap().unwrap()
}

pub fn ceilings(locations: usize, categories: usize) -> ConcurrencyConfig {
    ConcurrencyConfig {
        simultaneous_locations: locations,
        simultaneous_categories: categories,
        simultaneous_lookups: 1,
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub repo: Arc<InMemorySessionRepository>,
    pub use_case: Arc<ScrapeSessionUseCase>,
}

impl TestApp {
    pub async fn wait_for_terminal(&self, id: Uuid) -> SessionStatus {
        let handle = self.use_case.registry().get(id).unwrap();
        handle.wait().await.unwrap()
    }
}

pub fn create_test_app(fetcher: Arc<ScriptedFetcher>, provider: Option<&'static str>) -> TestApp {
    let repo = Arc::new(InMemorySessionRepository::new());
    let lookup = lookup_service(provider);
    let orchestrator = orchestrator(&repo, fetcher).with_lookup(lookup.clone());
    let use_case = Arc::new(ScrapeSessionUseCase::new(
        orchestrator,
        SessionRegistry::new(),
        lookup,
        ConcurrencySettings::default(),
    ));
    let server = TestServer::new(routes::routes(use_case.clone())).unwrap();

    TestApp {
        server,
        repo,
        use_case,
    }
}
