// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::business::Business;

/// 抓取错误类型
#[derive(Error, Debug)]
pub enum FetchError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 响应无法解析
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl FetchError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            FetchError::Timeout => true,
            FetchError::InvalidResponse(_) | FetchError::Other(_) => false,
        }
    }
}

/// 抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标地点
    pub location: String,
    /// 目标类别
    pub category: String,
    /// 超时时间
    pub timeout: Duration,
}

/// 商户抓取特质
///
/// 针对一个（地点, 类别）组合返回结构化的商户记录。
/// 页面内容如何解析为商户记录由实现方负责。
#[async_trait]
pub trait BusinessFetcher: Send + Sync {
    /// 执行抓取
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Business>, FetchError>;

    /// 抓取器名称
    fn name(&self) -> &'static str;
}

/// 解析服务错误类型
#[derive(Error, Debug)]
pub enum ResolverError {
    /// 解析服务不可达
    #[error("Resolver unreachable: {0}")]
    Unreachable(String),
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 响应无法解析
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ResolverError {
    /// 判断错误是否表示解析服务不可达
    ///
    /// 服务可达但拒绝请求（4xx、无法解析的响应）不算不可达。
    pub fn is_unreachable(&self) -> bool {
        match self {
            ResolverError::Unreachable(_) => true,
            ResolverError::RequestFailed(e) => e.is_connect() || e.is_timeout(),
            ResolverError::InvalidResponse(_) => false,
        }
    }
}

/// 运营商解析服务特质
///
/// 每次查询调用都会通过 `acquire` 获取一个会话（例如连接池），
/// 并在所有退出路径上调用一次 `cleanup` 释放。
#[async_trait]
pub trait ProviderResolver: Send + Sync {
    /// 获取解析会话
    async fn acquire(&self) -> Result<Box<dyn ResolverSession>, ResolverError>;
}

/// 解析会话特质
#[async_trait]
pub trait ResolverSession: Send + Sync {
    /// 解析一批规范化后的号码，返回号码到运营商名称的映射
    ///
    /// 结果中缺失的号码视为未解析。
    async fn resolve_batch(
        &self,
        numbers: &[String],
    ) -> Result<HashMap<String, String>, ResolverError>;

    /// 释放会话持有的资源，只允许调用一次
    async fn cleanup(self: Box<Self>);
}

/// 导出触发器特质
///
/// 会话进入 completed 状态时由编排器调用一次。
#[async_trait]
pub trait ExportTrigger: Send + Sync {
    /// 触发导出
    async fn trigger(&self, session_id: Uuid) -> anyhow::Result<()>;
}
