// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use leadrs::application::use_cases::scrape_session_use_case::ScrapeSessionUseCase;
use leadrs::config::settings::Settings;
use leadrs::domain::services::log_aggregator::LogAggregator;
use leadrs::domain::services::phone_normalizer::PhoneNormalizer;
use leadrs::domain::services::provider_lookup_service::{LookupConfig, ProviderLookupService};
use leadrs::engines::http_fetcher::HttpBusinessFetcher;
use leadrs::engines::http_resolver::HttpProviderResolver;
use leadrs::infrastructure::repositories::in_memory_session_repo::InMemorySessionRepository;
use leadrs::presentation::routes;
use leadrs::utils::telemetry;
use leadrs::workers::orchestrator::{Orchestrator, OrchestratorConfig};
use leadrs::workers::session_registry::{SessionRegistry, SessionSweeper};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Arc::new(Settings::new()?);

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(&settings.logging)?;
    info!("Starting leadrs...");
    leadrs::infrastructure::metrics::init_metrics(&settings.metrics);

    // 3. Session store and external collaborators
    let repository = Arc::new(InMemorySessionRepository::new());

    let fetcher = Arc::new(HttpBusinessFetcher::new(
        &settings.fetcher.endpoint,
        Duration::from_secs(settings.fetcher.request_timeout_secs),
    )?);
    info!(endpoint = %settings.fetcher.endpoint, "Business fetcher configured");

    let resolver = Arc::new(HttpProviderResolver::new(
        &settings.lookup.resolver_url,
        Duration::from_secs(settings.lookup.request_timeout_secs),
        settings.concurrency.simultaneous_lookups,
    )?);
    let lookup = ProviderLookupService::new(
        resolver,
        PhoneNormalizer::new(
            settings.phone.country_code.clone(),
            settings.phone.national_length,
        ),
        LookupConfig {
            max_concurrent_batches: settings.concurrency.simultaneous_lookups,
            batch_size: settings.lookup.batch_size,
        },
    );
    info!(resolver = %settings.lookup.resolver_url, "Provider resolver configured");

    // 4. Orchestrator, registry and sweeper
    let orchestrator = Orchestrator::new(
        repository.clone(),
        fetcher,
        LogAggregator::new(repository.clone(), settings.orchestrator.log_retention),
        OrchestratorConfig::from_settings(&settings.orchestrator),
    )
    .with_lookup(lookup.clone());

    let registry = SessionRegistry::new();
    let sweeper = SessionSweeper::new(
        registry.clone(),
        repository.clone(),
        settings.orchestrator.grace_period(),
        settings.orchestrator.sweep_interval(),
    )
    .start();

    let use_case = Arc::new(ScrapeSessionUseCase::new(
        orchestrator,
        registry,
        lookup,
        settings.concurrency.clone(),
    ));

    // 5. Start HTTP server
    let app = routes::routes(use_case).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
