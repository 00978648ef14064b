// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::engines::traits::{ProviderResolver, ResolverError, ResolverSession};

#[derive(Serialize)]
struct ResolveRequest<'a> {
    numbers: &'a [String],
}

#[derive(Deserialize)]
struct ResolveResponse {
    results: Vec<ResolvedNumber>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedNumber {
    phone_number: String,
    provider: Option<String>,
}

/// HTTP 运营商解析服务
///
/// 以 `POST {endpoint}`、请求体 `{ "numbers": [...] }` 的方式批量解析号码。
/// 每次查询调用创建独立的连接池，在 `cleanup` 中释放。
#[derive(Debug, Clone)]
pub struct HttpProviderResolver {
    endpoint: Url,
    timeout: Duration,
    max_idle_connections: usize,
}

impl HttpProviderResolver {
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        max_idle_connections: usize,
    ) -> Result<Self, ResolverError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ResolverError::Unreachable(format!("Invalid resolver url: {}", e)))?;
        Ok(Self {
            endpoint,
            timeout,
            max_idle_connections,
        })
    }
}

#[async_trait]
impl ProviderResolver for HttpProviderResolver {
    async fn acquire(&self) -> Result<Box<dyn ResolverSession>, ResolverError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.max_idle_connections)
            .build()?;

        Ok(Box::new(HttpResolverSession {
            client,
            endpoint: self.endpoint.clone(),
        }))
    }
}

/// 单次查询调用持有的解析会话
struct HttpResolverSession {
    client: reqwest::Client,
    endpoint: Url,
}

#[async_trait]
impl ResolverSession for HttpResolverSession {
    async fn resolve_batch(
        &self,
        numbers: &[String],
    ) -> Result<HashMap<String, String>, ResolverError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ResolveRequest { numbers })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ResolverError::Unreachable(e.to_string())
                } else {
                    ResolverError::RequestFailed(e)
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ResolverError::Unreachable(format!(
                "resolver responded with {}",
                status
            )));
        }

        let body: ResolveResponse = response
            .error_for_status()?
            .json()
            .await
            .map_err(|e| ResolverError::InvalidResponse(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .filter_map(|r| r.provider.map(|provider| (r.phone_number, provider)))
            .collect())
    }

    async fn cleanup(self: Box<Self>) {
        debug!(endpoint = %self.endpoint, "Releasing resolver session");
        drop(self.client);
    }
}
