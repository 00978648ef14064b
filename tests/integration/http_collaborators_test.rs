// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use leadrs::domain::services::phone_normalizer::PhoneNormalizer;
use leadrs::domain::services::provider_lookup_service::{LookupConfig, ProviderLookupService};
use leadrs::engines::http_fetcher::HttpBusinessFetcher;
use leadrs::engines::http_resolver::HttpProviderResolver;
use leadrs::engines::traits::{BusinessFetcher, FetchError, FetchRequest, ProviderResolver, ResolverError};
use leadrs::utils::errors::OrchestratorError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(location: &str, category: &str, timeout: Duration) -> FetchRequest {
    FetchRequest {
        location: location.to_string(),
        category: category.to_string(),
        timeout,
    }
}

async fn fetcher(server: &MockServer) -> HttpBusinessFetcher {
    HttpBusinessFetcher::new(
        &format!("{}/v1/businesses", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetcher_parses_business_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/businesses"))
        .and(query_param("location", "Cape Town"))
        .and(query_param("category", "plumbers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "Drip Drop Plumbing", "phone": "+27 68 612 8512", "address": "1 Long St" },
            { "name": "Pipe Masters", "category": "plumbers", "location": "Cape Town" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let businesses = fetcher(&server)
        .await
        .fetch(&request("Cape Town", "plumbers", Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(businesses.len(), 2);
    assert_eq!(businesses[0].name, "Drip Drop Plumbing");
    assert_eq!(businesses[0].phone.as_deref(), Some("+27 68 612 8512"));
    // Missing pair fields are filled from the request
    assert_eq!(businesses[0].location, "Cape Town");
    assert_eq!(businesses[0].category, "plumbers");
    assert_eq!(businesses[1].name, "Pipe Masters");
}

#[tokio::test]
async fn test_fetcher_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/businesses"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .await
        .fetch(&request("Durban", "dentists", Duration::from_secs(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::RequestFailed(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_fetcher_rejects_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/businesses"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .await
        .fetch(&request("Durban", "dentists", Duration::from_secs(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::InvalidResponse(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_fetcher_honours_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/businesses"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = fetcher(&server)
        .await
        .fetch(&request("Durban", "dentists", Duration::from_millis(50)))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout));
}

fn resolver(uri: &str) -> Arc<HttpProviderResolver> {
    Arc::new(
        HttpProviderResolver::new(&format!("{}/v1/resolve", uri), Duration::from_secs(2), 2)
            .unwrap(),
    )
}

#[tokio::test]
async fn test_resolver_maps_numbers_and_skips_unresolved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/resolve"))
        .and(body_json(json!({ "numbers": ["0686128512", "0821234567"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "phoneNumber": "0686128512", "provider": "Telkom" },
                { "phoneNumber": "0821234567", "provider": null }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = resolver(&server.uri()).acquire().await.unwrap();
    let resolved = session
        .resolve_batch(&["0686128512".to_string(), "0821234567".to_string()])
        .await
        .unwrap();
    session.cleanup().await;

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved.get("0686128512").map(String::as_str), Some("Telkom"));
}

#[tokio::test]
async fn test_resolver_server_error_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/resolve"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let session = resolver(&server.uri()).acquire().await.unwrap();
    let err = session
        .resolve_batch(&["0686128512".to_string()])
        .await
        .unwrap_err();
    session.cleanup().await;

    assert!(matches!(err, ResolverError::Unreachable(_)));
}

#[tokio::test]
async fn test_single_number_single_batch_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/resolve"))
        .and(body_json(json!({ "numbers": ["0686128512"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "phoneNumber": "0686128512", "provider": "Vodacom" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = ProviderLookupService::new(
        resolver(&server.uri()),
        PhoneNormalizer::default(),
        LookupConfig {
            max_concurrent_batches: 1,
            batch_size: 1,
        },
    );

    let providers = lookup.lookup_providers(["0686128512"]).await.unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers.get("0686128512").map(String::as_str), Some("Vodacom"));
}

#[tokio::test]
async fn test_lookup_against_unreachable_resolver() {
    // Nothing listens on the discard port
    let lookup = ProviderLookupService::new(
        resolver("http://127.0.0.1:9"),
        PhoneNormalizer::default(),
        LookupConfig::default(),
    );

    let err = lookup
        .lookup_providers(["+27 68 612 8512", "0821234567"])
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::LookupUnavailable(_)));
}

#[tokio::test]
async fn test_lookup_rejected_by_resolver_maps_to_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/resolve"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unsupported number"))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = ProviderLookupService::new(
        resolver(&server.uri()),
        PhoneNormalizer::default(),
        LookupConfig::default(),
    );

    let (number, provider) = lookup.lookup("+44 20 7946 0958").await.unwrap();
    assert_eq!(number, "+442079460958");
    assert_eq!(provider, "Unknown");
}
