// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use crate::config::settings::OrchestratorSettings;
use crate::engines::traits::FetchError;

/// 单个抓取任务的重试策略
///
/// 默认不重试：任务失败即记录日志并继续运行。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 不重试的策略
    pub fn none() -> Self {
        Self::default()
    }

    /// 根据编排器配置创建重试策略
    pub fn from_settings(settings: &OrchestratorSettings) -> Self {
        Self {
            max_retries: settings.max_task_retries,
            initial_backoff: Duration::from_millis(settings.retry_initial_backoff_ms),
            ..Self::default()
        }
    }

    /// 计算第 `attempt` 次重试前的退避时间（`attempt` 从 1 开始）
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let backoff_secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        // 限制最大退避时间
        let capped_backoff = backoff_secs.min(self.max_backoff.as_secs_f64());

        let final_backoff = if self.enable_jitter && capped_backoff > 0.0 {
            let jitter_range = capped_backoff * self.jitter_factor;
            if jitter_range > 0.0 {
                let jitter = rand::random_range(-jitter_range..jitter_range);
                (capped_backoff + jitter).max(0.0)
            } else {
                capped_backoff
            }
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 已重试 `retries` 次后是否还允许重试
    pub fn should_retry(&self, retries: u32) -> bool {
        retries < self.max_retries
    }

    /// 根据错误类型判断是否应该重试
    pub fn should_retry_fetch(&self, retries: u32, error: &FetchError) -> bool {
        self.should_retry(retries) && error.is_retryable()
    }
}
