// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::*;
use leadrs::domain::models::log_entry::LogLevel;
use leadrs::domain::models::session::SessionStatus;
use leadrs::infrastructure::repositories::in_memory_session_repo::InMemorySessionRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const LOCATIONS: [&str; 2] = ["Cape Town", "Johannesburg"];
const CATEGORIES: [&str; 3] = ["plumbers", "electricians", "dentists"];

/// 2 个地点 × 3 个类别，全部成功
#[tokio::test]
async fn test_all_fetches_succeed() {
    let repo = Arc::new(InMemorySessionRepository::new());
    let fetcher = Arc::new(ScriptedFetcher::default());
    let orchestrator = orchestrator(&repo, fetcher.clone());

    let handle = start_run(&orchestrator, &repo, &LOCATIONS, &CATEGORIES, ceilings(2, 2)).await;
    assert_eq!(handle.wait().await.unwrap(), SessionStatus::Completed);

    let session = snapshot(&repo, handle.session_id()).await;
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.businesses.len(), 6);
    assert_eq!(session.progress.percent(session.status), 100);
    let successes = session
        .logs
        .iter()
        .filter(|l| l.level == LogLevel::Success)
        .count();
    assert_eq!(successes, 6);
}

/// 单个任务失败不会让会话失败，也不会被重试
#[tokio::test]
async fn test_single_fetch_failure() {
    let repo = Arc::new(InMemorySessionRepository::new());
    let fetcher = Arc::new(ScriptedFetcher::failing("Johannesburg", "electricians"));
    let orchestrator = orchestrator(&repo, fetcher.clone());

    let handle = start_run(&orchestrator, &repo, &LOCATIONS, &CATEGORIES, ceilings(2, 2)).await;
    assert_eq!(handle.wait().await.unwrap(), SessionStatus::Completed);

    let session = snapshot(&repo, handle.session_id()).await;
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.businesses.len(), 5);
    let errors: Vec<_> = session
        .logs
        .iter()
        .filter(|l| l.level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("electricians"));
    assert_eq!(fetcher.calls_for("Johannesburg", "electricians"), 1);
    assert_eq!(fetcher.calls(), 6);
}

#[tokio::test]
async fn test_concurrency_ceilings_hold() {
    let locations = ["Durban", "Pretoria", "Soweto", "Polokwane"];
    let categories = ["bakeries", "florists", "plumbers", "dentists", "lawyers"];

    for (max_locations, max_categories) in [(1, 1), (1, 3), (2, 2), (3, 2), (5, 10)] {
        let repo = Arc::new(InMemorySessionRepository::new());
        let fetcher = Arc::new(ScriptedFetcher::with_delay(Duration::from_millis(5)));
        let orchestrator = orchestrator(&repo, fetcher.clone());

        let handle = start_run(
            &orchestrator,
            &repo,
            &locations,
            &categories,
            ceilings(max_locations, max_categories),
        )
        .await;
        assert_eq!(handle.wait().await.unwrap(), SessionStatus::Completed);

        assert!(
            fetcher.max_concurrent_locations() <= max_locations,
            "locations {} > {}",
            fetcher.max_concurrent_locations(),
            max_locations
        );
        assert!(
            fetcher.max_concurrent_categories() <= max_categories,
            "categories {} > {}",
            fetcher.max_concurrent_categories(),
            max_categories
        );
        assert_eq!(fetcher.calls(), 20);
        assert_eq!(snapshot(&repo, handle.session_id()).await.businesses.len(), 20);
    }
}

#[tokio::test]
async fn test_progress_is_monotonic_and_only_terminal_reaches_100() {
    let repo = Arc::new(InMemorySessionRepository::new());
    let fetcher = Arc::new(ScriptedFetcher::with_delay(Duration::from_millis(3)));
    let orchestrator = orchestrator(&repo, fetcher);

    let handle = start_run(
        &orchestrator,
        &repo,
        &["Durban", "Pretoria", "Soweto"],
        &["bakeries", "florists", "plumbers", "dentists"],
        ceilings(1, 2),
    )
    .await;

    let mut observed = Vec::new();
    loop {
        let session = snapshot(&repo, handle.session_id()).await;
        let percent = session.progress.percent(session.status);
        if !session.status.is_terminal() {
            assert!(percent < 100);
        }
        observed.push(percent);
        if session.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(observed.last().copied(), Some(100));
}

#[tokio::test]
async fn test_pause_then_resume_matches_uninterrupted_run() {
    let mut results = Vec::new();

    for interrupt in [false, true] {
        let repo = Arc::new(InMemorySessionRepository::new());
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(ScriptedFetcher::gated(gate.clone()));
        let orchestrator = orchestrator(&repo, fetcher.clone());

        let handle = start_run(&orchestrator, &repo, &LOCATIONS, &CATEGORIES, ceilings(2, 2)).await;

        if interrupt {
            handle.pause().await.unwrap();
            handle.resume().await.unwrap();
        }
        gate.add_permits(100);

        assert_eq!(handle.wait().await.unwrap(), SessionStatus::Completed);
        let mut names: Vec<String> = snapshot(&repo, handle.session_id())
            .await
            .businesses
            .into_iter()
            .map(|b| b.name)
            .collect();
        names.sort();
        results.push(names);
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].len(), 6);
}

#[tokio::test]
async fn test_stop_keeps_partial_results() {
    let repo = Arc::new(InMemorySessionRepository::new());
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = Arc::new(ScriptedFetcher::gated(gate.clone()));
    let orchestrator = orchestrator(&repo, fetcher.clone());

    let handle = start_run(&orchestrator, &repo, &["Durban"], &CATEGORIES, ceilings(1, 1)).await;
    let id = handle.session_id();

    // Let exactly one task through
    gate.add_permits(1);
    for _ in 0..300 {
        if snapshot(&repo, id).await.progress.completed_tasks == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let outcome = handle.stop().await.unwrap();
    assert_eq!(outcome.status, SessionStatus::Stopped);
    assert_eq!(outcome.businesses_collected, 1);

    gate.add_permits(100);
    assert_eq!(handle.wait().await.unwrap(), SessionStatus::Stopped);

    let session = snapshot(&repo, id).await;
    assert_eq!(session.businesses.len(), 1);
    assert!(session
        .logs
        .iter()
        .any(|l| l.message == "Session stopped. 1 businesses collected"));
}
