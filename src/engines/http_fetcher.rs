// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::domain::models::business::Business;
use crate::engines::traits::{BusinessFetcher, FetchError, FetchRequest};

/// HTTP 商户抓取器
///
/// 以 `GET {endpoint}?location=..&category=..` 的方式调用上游抓取服务，
/// 上游返回 JSON 数组形式的商户记录。
pub struct HttpBusinessFetcher {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpBusinessFetcher {
    /// 创建新的抓取器实例
    ///
    /// # 参数
    ///
    /// * `endpoint` - 上游抓取服务地址
    /// * `timeout` - 客户端级别的请求超时
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FetchError::Other(format!("Invalid fetcher endpoint: {}", e)))?;
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; leadrs/0.1)")
            .timeout(timeout)
            .build()?;

        Ok(Self { endpoint, client })
    }

    fn request_url(&self, request: &FetchRequest) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("location", &request.location)
            .append_pair("category", &request.category);
        url
    }
}

#[async_trait]
impl BusinessFetcher for HttpBusinessFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Business>, FetchError> {
        let url = self.request_url(request);
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::RequestFailed(e)
                }
            })?
            .error_for_status()?;

        let mut businesses: Vec<Business> = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        // Upstream records may omit the pair they were fetched for
        for business in &mut businesses {
            if business.location.is_empty() {
                business.location = request.location.clone();
            }
            if business.category.is_empty() {
                business.category = request.category.clone();
            }
        }

        debug!(
            location = %request.location,
            category = %request.category,
            count = businesses.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched businesses"
        );

        Ok(businesses)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
